//! The overlays cellframe ships with.
//!
//! - **MainMenu**: base overlay, entry points to everything else
//! - **Settings**: edit target FPS / tick rate, toggle debug and verbose logging
//! - **Prompt**: text input for the numeric settings, validated on submit
//! - **Help**: key reference
//! - **Debug**: readout of the settings snapshot
//! - **DetailedDebug**: animated readout of uptime, frame count and loop timings

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tracing::{info, warn};

use crate::config::{parse_refresh_rate, parse_tick_rate, SettingsError, SharedSettings};
use crate::core::timings::TimingsManager;
use crate::engine::state::{lock, ActionContext};
use crate::ui::overlay::{Align, InputBuffer, Overlay, OverlayBuilder, Overlays};

pub const MAIN_MENU: &str = "MainMenu";
pub const SETTINGS: &str = "Settings";
pub const PROMPT: &str = "Prompt";
pub const HELP: &str = "Help";
pub const DEBUG: &str = "Debug";
pub const DETAILED_DEBUG: &str = "DetailedDebug";

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Numeric setting being edited in the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingField {
    RefreshRate,
    TickRate,
}

impl SettingField {
    fn prompt(self) -> &'static str {
        match self {
            SettingField::RefreshRate => "Enter New Target FPS:",
            SettingField::TickRate => "Enter New Tick Rate (Maximum 20):",
        }
    }

    fn label(self) -> &'static str {
        match self {
            SettingField::RefreshRate => "Target FPS",
            SettingField::TickRate => "Tick rate",
        }
    }
}

/// State shared between the Settings and Prompt overlays
#[derive(Debug, Default)]
struct Editor {
    field: Option<SettingField>,
    warning: Option<String>,
    status: Option<String>,
}

/// Builds the overlay set around one settings handle
pub struct App {
    settings: SharedSettings,
    input: InputBuffer,
    editor: Arc<Mutex<Editor>>,
    started: Instant,
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

impl App {
    pub fn new(settings: SharedSettings) -> Self {
        Self {
            settings,
            input: InputBuffer::new(),
            editor: Arc::new(Mutex::new(Editor::default())),
            started: Instant::now(),
        }
    }

    /// Buffer edited by the Prompt overlay
    pub fn input(&self) -> InputBuffer {
        self.input.clone()
    }

    pub fn overlays(&self) -> Overlays {
        Overlays::new()
            .with(self.main_menu())
            .with(self.settings_menu())
            .with(self.prompt())
            .with(Self::help())
            .with(self.debug())
            .with(self.detailed_debug())
    }

    fn main_menu(&self) -> Overlay {
        OverlayBuilder::new(MAIN_MENU)
            .lockable()
            .aligned_text("Console/Terminal Rendering Engine", Align::Center, 0)
            .button("Settings", 4, 2, 1, |ctx| ctx.show(SETTINGS))
            .button("Help", 4, 3, 1, |ctx| ctx.toggle(HELP))
            .button("Debug", 4, 4, 1, |ctx| ctx.toggle(DEBUG))
            .button("Quit", 4, 6, 1, |ctx| ctx.exit())
            .aligned_text("Arrows: move  Enter: select  Esc: quit", Align::Left, 8)
            .build()
    }

    fn settings_menu(&self) -> Overlay {
        let fps = self.settings.clone();
        let tick = self.settings.clone();
        let debug = self.settings.clone();
        let verbose = self.settings.clone();

        OverlayBuilder::new(SETTINGS)
            .lockable()
            .aligned_text("[ Settings ]", Align::Center, 0)
            .dynamic_button(
                move || format!("Target FPS ({})", read(&fps).refresh_rate),
                2,
                2,
                1,
                self.begin_edit(SettingField::RefreshRate),
            )
            .dynamic_button(
                move || format!("Background Tick Rate ({})", read(&tick).tick_rate),
                2,
                3,
                1,
                self.begin_edit(SettingField::TickRate),
            )
            .dynamic_button(
                move || format!("Debug Logging ({})", on_off(read(&debug).debug)),
                2,
                5,
                1,
                self.toggle_flag(|s| &mut s.debug),
            )
            .dynamic_button(
                move || format!("Verbose Logging ({})", on_off(read(&verbose).verbose)),
                2,
                6,
                1,
                self.toggle_flag(|s| &mut s.verbose),
            )
            .button("Back", 2, 8, 1, |ctx| ctx.close())
            .dynamic_text(self.status_text(), 2, 10)
            .aligned_text(&format!("cellframe {}", VERSION), Align::Right, 12)
            .build()
    }

    fn prompt(&self) -> Overlay {
        let description = self.editor.clone();
        let warning = self.editor.clone();
        let editor = self.editor.clone();
        let settings = self.settings.clone();

        OverlayBuilder::new(PROMPT)
            .dynamic_text(
                move || {
                    lock(&description)
                        .field
                        .map_or("", SettingField::prompt)
                        .to_string()
                },
                2,
                0,
            )
            .dynamic_text(
                move || lock(&warning).warning.clone().unwrap_or_default(),
                2,
                1,
            )
            .text_input(&self.input, 2, 3, 1)
            .text("Enter: confirm  Esc: cancel", 2, 5)
            .on_submit(move |text, ctx| submit(&editor, &settings, text, ctx))
            .build()
    }

    fn help() -> Overlay {
        OverlayBuilder::new(HELP)
            .aligned_text("[ Help ]", Align::Center, 0)
            .text("Up/Down   move between buttons", 2, 2)
            .text("Enter     activate the focused button", 2, 3)
            .text("F1        toggle debug readout", 2, 4)
            .text("F2        open settings", 2, 5)
            .text("F3        toggle detailed debug readout", 2, 6)
            .text("Q         toggle this help", 2, 7)
            .text("Esc       back / quit", 2, 8)
            .text("Ctrl+C    quit", 2, 9)
            .build()
    }

    fn debug(&self) -> Overlay {
        let settings = self.settings.clone();
        OverlayBuilder::new(DEBUG)
            .aligned_text("[ Debug ]", Align::Center, 0)
            .dynamic_text(
                move || {
                    let s = read(&settings);
                    format!(
                        "refresh={}fps tick={} debug={} verbose={}",
                        s.refresh_rate,
                        s.tick_rate,
                        on_off(s.debug),
                        on_off(s.verbose)
                    )
                },
                2,
                2,
            )
            .text(&format!("version {}", VERSION), 2, 3)
            .build()
    }

    fn detailed_debug(&self) -> Overlay {
        let started = self.started;
        let frames = AtomicU64::new(0);
        let settings = self.settings.clone();
        OverlayBuilder::new(DETAILED_DEBUG)
            .animated()
            .aligned_text("[ Detailed Debug ]", Align::Center, 0)
            .dynamic_text(
                move || {
                    // Evaluated once per build, so this counts frames
                    let built = frames.fetch_add(1, Ordering::Relaxed) + 1;
                    format!(
                        "uptime={:.1}s frames={}",
                        started.elapsed().as_secs_f32(),
                        built
                    )
                },
                2,
                2,
            )
            .dynamic_text(
                move || {
                    let timings = TimingsManager::new(&read(&settings));
                    format!(
                        "tick={}ms frame={}ms",
                        timings.tick_interval_ms, timings.frame_interval_ms
                    )
                },
                2,
                3,
            )
            .build()
    }

    /// Action that opens the prompt for a field
    fn begin_edit(&self, field: SettingField) -> impl Fn(&mut ActionContext) + Send + Sync {
        let editor = self.editor.clone();
        let input = self.input.clone();
        move |ctx| {
            {
                let mut editor = lock(&editor);
                editor.field = Some(field);
                editor.warning = None;
            }
            input.clear();
            ctx.show(PROMPT);
        }
    }

    /// Action that flips a boolean setting; takes effect after restart
    fn toggle_flag(
        &self,
        flag: fn(&mut crate::config::Settings) -> &mut bool,
    ) -> impl Fn(&mut ActionContext) + Send + Sync {
        let settings = self.settings.clone();
        let editor = self.editor.clone();
        move |ctx| {
            {
                let mut settings = settings.write().unwrap_or_else(PoisonError::into_inner);
                let value = flag(&mut *settings);
                *value = !*value;
            }
            lock(&editor).status = Some("Info: Restart required".to_string());
            ctx.refresh();
        }
    }

    fn status_text(&self) -> impl Fn() -> String + Send + Sync {
        let editor = self.editor.clone();
        move || lock(&editor).status.clone().unwrap_or_default()
    }
}

fn read(settings: &SharedSettings) -> std::sync::RwLockReadGuard<'_, crate::config::Settings> {
    settings.read().unwrap_or_else(PoisonError::into_inner)
}

/// Validate and commit a prompt entry; on failure keep the prompt open with a warning.
fn submit(editor: &Mutex<Editor>, settings: &SharedSettings, text: &str, ctx: &mut ActionContext) {
    let mut editor = lock(editor);
    let Some(field) = editor.field else {
        ctx.show(SETTINGS);
        return;
    };

    let result: Result<u32, SettingsError> = match field {
        SettingField::RefreshRate => parse_refresh_rate(text),
        SettingField::TickRate => parse_tick_rate(text),
    };

    match result {
        Ok(value) => {
            {
                let mut settings = settings.write().unwrap_or_else(PoisonError::into_inner);
                match field {
                    SettingField::RefreshRate => settings.refresh_rate = value,
                    SettingField::TickRate => settings.tick_rate = value,
                }
            }
            info!("{} set to {}", field.label(), value);
            editor.field = None;
            editor.warning = None;
            editor.status = Some(format!("{} set to {}", field.label(), value));
            ctx.reload_settings();
            ctx.show(SETTINGS);
        }
        Err(e) => {
            warn!("Rejected {} input: {}", field.label(), e);
            editor.warning = Some(format!("Error: {}", e));
            ctx.refresh();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::engine::orchestrator::Director;
    use crate::engine::state::{Request, Shared};
    use crate::ui::compositor::Compositor;
    use crate::ui::navigation::Navigation;

    fn setup() -> (App, Director, Shared, SharedSettings) {
        let settings = Settings::default().into_shared();
        let app = App::new(settings.clone());
        let compositor = Compositor::new(100, 30, app.overlays());
        let director = Director::new(compositor, MAIN_MENU, app.input(), settings.clone());
        let shared = Shared::new(100, 30, director.timings().tick());
        (app, director, shared, settings)
    }

    fn type_text(director: &mut Director, shared: &Shared, text: &str) {
        for ch in text.chars() {
            director.apply(Request::InputChar(ch), shared);
        }
        director.apply(Request::InputConfirm, shared);
    }

    #[test]
    fn test_every_overlay_builds_in_bounds() {
        let (app, _, _, _) = setup();
        let mut compositor = Compositor::new(100, 30, app.overlays());
        for name in [MAIN_MENU, SETTINGS, PROMPT, HELP, DEBUG, DETAILED_DEBUG] {
            let report = compositor.build_frame(name).unwrap();
            assert!(report.out_of_bounds.is_empty(), "{} clipped", name);
        }
    }

    #[test]
    fn test_main_menu_buttons() {
        let (_, mut director, shared, _) = setup();
        director.sync(&shared).unwrap();
        assert_eq!(director.compositor().navigator().registry().len(), 4);

        // First button opens settings
        director.apply(Request::Navigate(Navigation::Enter), &shared);
        assert_eq!(shared.snapshot().active_overlay.as_deref(), Some(SETTINGS));
    }

    #[test]
    fn test_edit_refresh_rate() {
        let (_, mut director, shared, settings) = setup();
        director.apply(Request::ShowOverlay(SETTINGS.into()), &shared);
        director.sync(&shared).unwrap();
        assert!(director.compositor().row_text(2).contains("Target FPS (5)"));

        // Focus starts on "Target FPS"
        director.apply(Request::Navigate(Navigation::Enter), &shared);
        assert_eq!(shared.snapshot().active_overlay.as_deref(), Some(PROMPT));
        assert!(director.input_mode(&shared));
        director.sync(&shared).unwrap();
        assert!(director.compositor().row_text(0).contains("Enter New Target FPS:"));

        // Non-numeric input is rejected and reprompted
        type_text(&mut director, &shared, "fast");
        assert_eq!(shared.snapshot().active_overlay.as_deref(), Some(PROMPT));
        director.sync(&shared).unwrap();
        assert!(director.compositor().row_text(1).contains("Please enter a valid value"));
        assert_eq!(settings.read().unwrap().refresh_rate, 5);

        // Zero is rejected
        type_text(&mut director, &shared, "0");
        director.sync(&shared).unwrap();
        assert!(director.compositor().row_text(1).contains("cannot be set below 1"));

        type_text(&mut director, &shared, "25");
        assert_eq!(settings.read().unwrap().refresh_rate, 25);
        assert_eq!(director.timings().frame_interval_ms, 40);
        assert_eq!(shared.snapshot().active_overlay.as_deref(), Some(SETTINGS));

        director.sync(&shared).unwrap();
        assert!(director.compositor().row_text(2).contains("Target FPS (25)"));
        assert!(director.compositor().row_text(10).contains("Target FPS set to 25"));
    }

    #[test]
    fn test_edit_tick_rate_out_of_range() {
        let (_, mut director, shared, settings) = setup();
        director.apply(Request::ShowOverlay(SETTINGS.into()), &shared);
        director.sync(&shared).unwrap();
        director.apply(Request::Navigate(Navigation::Down), &shared);
        director.apply(Request::Navigate(Navigation::Enter), &shared);
        assert_eq!(shared.snapshot().active_overlay.as_deref(), Some(PROMPT));

        type_text(&mut director, &shared, "21");
        assert_eq!(settings.read().unwrap().tick_rate, 2);
        assert_eq!(shared.snapshot().active_overlay.as_deref(), Some(PROMPT));

        type_text(&mut director, &shared, "10");
        assert_eq!(settings.read().unwrap().tick_rate, 10);
        assert_eq!(director.timings().tick_interval_ms, 500);
        assert_eq!(shared.tick().as_millis(), 500);
    }

    #[test]
    fn test_toggle_debug_flag() {
        let (_, mut director, shared, settings) = setup();
        director.apply(Request::ShowOverlay(SETTINGS.into()), &shared);
        director.sync(&shared).unwrap();
        for _ in 0..2 {
            director.apply(Request::Navigate(Navigation::Down), &shared);
        }
        director.apply(Request::Navigate(Navigation::Enter), &shared);
        assert!(settings.read().unwrap().debug);

        director.sync(&shared).unwrap();
        assert!(director.compositor().row_text(5).contains("Debug Logging (on)"));
        assert!(director.compositor().row_text(10).contains("Restart required"));
    }

    #[test]
    fn test_prompt_cancel_discards_input() {
        let (app, mut director, shared, _) = setup();
        director.apply(Request::ShowOverlay(SETTINGS.into()), &shared);
        director.sync(&shared).unwrap();
        director.apply(Request::Navigate(Navigation::Enter), &shared);
        director.apply(Request::InputChar('9'), &shared);
        director.apply(Request::InputCancel, &shared);

        assert_eq!(app.input().contents(), "");
        assert_eq!(shared.snapshot().active_overlay, None);
        assert!(!director.input_mode(&shared));
    }

    #[test]
    fn test_detailed_debug_counts_frames() {
        let (_, mut director, shared, _) = setup();
        director.apply(Request::ToggleOverlay(DETAILED_DEBUG.into()), &shared);
        director.sync(&shared).unwrap();
        assert!(director.is_animated());
        assert!(director.compositor().row_text(2).contains("frames=1"));
        assert!(director.compositor().row_text(3).contains("tick=100ms frame=200ms"));

        // Animated overlays rebuild on every sync
        assert!(director.sync(&shared).unwrap());
        assert!(director.compositor().row_text(2).contains("frames=2"));
    }
}
