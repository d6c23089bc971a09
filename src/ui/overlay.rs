//! Declarative overlay descriptions.
//!
//! An overlay is a named, ordered list of [`Component`]s. Builders only record
//! what to draw; coordinates and bounds are resolved by the compositor when a
//! frame is built.
//!
//! # Example
//!
//! ```ignore
//! let menu = OverlayBuilder::new("MainMenu")
//!     .lockable()
//!     .text("Main Menu", 0, 0)
//!     .button("Settings", 0, 2, 1, |ctx| ctx.show("Settings"))
//!     .button("Quit", 0, 3, 1, |ctx| ctx.exit())
//!     .build();
//! ```
//!
//! Text and action callbacks are only ever invoked on the redraw loop, never
//! concurrently with navigation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::engine::state::{lock, ActionContext};

/// Produces text at frame-build time
pub type TextSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Invoked when a focused button is activated
pub type Action = Arc<dyn Fn(&mut ActionContext) + Send + Sync>;

/// Invoked with the input buffer when a text-input overlay is confirmed
pub type SubmitAction = Arc<dyn Fn(&str, &mut ActionContext) + Send + Sync>;

/// Glyph-grid coordinates (column, row)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Horizontal alignment for [`Component::AlignedText`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// One drawable element of an overlay
#[derive(Clone)]
pub enum Component {
    StaticText {
        text: String,
        pos: Position,
    },
    AlignedText {
        text: String,
        align: Align,
        row: usize,
    },
    DynamicText {
        source: TextSource,
        pos: Position,
    },
    Button {
        text: String,
        pos: Position,
        border: u8,
        action: Action,
    },
    DynamicButton {
        source: TextSource,
        pos: Position,
        border: u8,
        action: Action,
    },
    TextInput {
        source: TextSource,
        pos: Position,
        border: u8,
    },
}

impl Component {
    /// Short name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Component::StaticText { .. } => "StaticText",
            Component::AlignedText { .. } => "AlignedText",
            Component::DynamicText { .. } => "DynamicText",
            Component::Button { .. } => "Button",
            Component::DynamicButton { .. } => "DynamicButton",
            Component::TextInput { .. } => "TextInput",
        }
    }

    /// Action carried by buttons
    pub fn action(&self) -> Option<&Action> {
        match self {
            Component::Button { action, .. } | Component::DynamicButton { action, .. } => {
                Some(action)
            }
            _ => None,
        }
    }

    /// Border level (0 for components without one)
    pub fn border(&self) -> u8 {
        match self {
            Component::Button { border, .. }
            | Component::DynamicButton { border, .. }
            | Component::TextInput { border, .. } => *border,
            _ => 0,
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::StaticText { text, pos } => f
                .debug_struct("StaticText")
                .field("text", text)
                .field("pos", pos)
                .finish(),
            Component::AlignedText { text, align, row } => f
                .debug_struct("AlignedText")
                .field("text", text)
                .field("align", align)
                .field("row", row)
                .finish(),
            Component::Button { text, pos, border, .. } => f
                .debug_struct("Button")
                .field("text", text)
                .field("pos", pos)
                .field("border", border)
                .finish_non_exhaustive(),
            Component::DynamicText { pos, .. } => f
                .debug_struct("DynamicText")
                .field("pos", pos)
                .finish_non_exhaustive(),
            Component::DynamicButton { pos, border, .. } => f
                .debug_struct("DynamicButton")
                .field("pos", pos)
                .field("border", border)
                .finish_non_exhaustive(),
            Component::TextInput { pos, border, .. } => f
                .debug_struct("TextInput")
                .field("pos", pos)
                .field("border", border)
                .finish_non_exhaustive(),
        }
    }
}

/// How the redraw loop paces an overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    /// Redraw only after something changed
    #[default]
    OnDemand,
    /// Redraw continuously at the frame interval
    Animated,
}

/// A named screen layout
#[derive(Clone)]
pub struct Overlay {
    pub name: String,
    pub components: Vec<Component>,
    /// Buttons are navigable
    pub lockable: bool,
    pub refresh: RefreshMode,
    pub on_submit: Option<SubmitAction>,
}

impl Overlay {
    /// Whether this overlay captures free text instead of navigation keys
    pub fn captures_text(&self) -> bool {
        self.components
            .iter()
            .any(|c| matches!(c, Component::TextInput { .. }))
    }

    pub fn is_animated(&self) -> bool {
        self.refresh == RefreshMode::Animated
    }
}

impl fmt::Debug for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overlay")
            .field("name", &self.name)
            .field("components", &self.components)
            .field("lockable", &self.lockable)
            .field("refresh", &self.refresh)
            .field("on_submit", &self.on_submit.is_some())
            .finish()
    }
}

/// Accumulates components for one overlay
pub struct OverlayBuilder {
    overlay: Overlay,
}

impl OverlayBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            overlay: Overlay {
                name: name.to_string(),
                components: Vec::new(),
                lockable: false,
                refresh: RefreshMode::OnDemand,
                on_submit: None,
            },
        }
    }

    /// Make the overlay's buttons navigable
    pub fn lockable(mut self) -> Self {
        self.overlay.lockable = true;
        self
    }

    /// Redraw continuously instead of on demand
    pub fn animated(mut self) -> Self {
        self.overlay.refresh = RefreshMode::Animated;
        self
    }

    pub fn on_submit<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &mut ActionContext) + Send + Sync + 'static,
    {
        self.overlay.on_submit = Some(Arc::new(handler));
        self
    }

    pub fn component(mut self, component: Component) -> Self {
        self.overlay.components.push(component);
        self
    }

    pub fn text(self, text: &str, x: usize, y: usize) -> Self {
        self.component(Component::StaticText {
            text: text.to_string(),
            pos: Position::new(x, y),
        })
    }

    pub fn aligned_text(self, text: &str, align: Align, row: usize) -> Self {
        self.component(Component::AlignedText {
            text: text.to_string(),
            align,
            row,
        })
    }

    pub fn dynamic_text<S>(self, source: S, x: usize, y: usize) -> Self
    where
        S: Fn() -> String + Send + Sync + 'static,
    {
        self.component(Component::DynamicText {
            source: Arc::new(source),
            pos: Position::new(x, y),
        })
    }

    pub fn button<A>(self, text: &str, x: usize, y: usize, border: u8, action: A) -> Self
    where
        A: Fn(&mut ActionContext) + Send + Sync + 'static,
    {
        self.component(Component::Button {
            text: text.to_string(),
            pos: Position::new(x, y),
            border,
            action: Arc::new(action),
        })
    }

    pub fn dynamic_button<S, A>(self, source: S, x: usize, y: usize, border: u8, action: A) -> Self
    where
        S: Fn() -> String + Send + Sync + 'static,
        A: Fn(&mut ActionContext) + Send + Sync + 'static,
    {
        self.component(Component::DynamicButton {
            source: Arc::new(source),
            pos: Position::new(x, y),
            border,
            action: Arc::new(action),
        })
    }

    pub fn text_input(self, input: &InputBuffer, x: usize, y: usize, border: u8) -> Self {
        let input = input.clone();
        self.component(Component::TextInput {
            source: Arc::new(move || input.contents()),
            pos: Position::new(x, y),
            border,
        })
    }

    pub fn build(self) -> Overlay {
        self.overlay
    }
}

/// Registered overlays by name
#[derive(Debug, Clone, Default)]
pub struct Overlays {
    overlays: HashMap<String, Overlay>,
}

impl Overlays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an overlay, replacing any previous one with the same name.
    pub fn insert(&mut self, overlay: Overlay) -> Option<Overlay> {
        let previous = self.overlays.insert(overlay.name.clone(), overlay);
        if let Some(old) = &previous {
            debug!("Overlay {:?} re-registered, previous layout replaced", old.name);
        }
        previous
    }

    pub fn with(mut self, overlay: Overlay) -> Self {
        self.insert(overlay);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Overlay> {
        self.overlays.get(name)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.overlays.len()
    }
}

/// Free-text line edited while a text-input overlay is active
#[derive(Debug, Clone, Default)]
pub struct InputBuffer {
    inner: Arc<Mutex<String>>,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, ch: char) {
        lock(&self.inner).push(ch);
    }

    pub fn backspace(&self) {
        lock(&self.inner).pop();
    }

    pub fn clear(&self) {
        lock(&self.inner).clear();
    }

    /// Take the contents, leaving the buffer empty
    pub fn take(&self) -> String {
        std::mem::take(&mut *lock(&self.inner))
    }

    pub fn contents(&self) -> String {
        lock(&self.inner).clone()
    }
}
