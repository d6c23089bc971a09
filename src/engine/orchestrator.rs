//! The three engine loops.
//!
//! ```text
//! input loop ──Request──┐
//!                       ├──> request queue ──> redraw loop (owns Compositor)
//! resize loop ──dims────┘          │                 │
//!          └────── PauseSignal::resume ──────────────┘
//! ```
//!
//! Only the redraw loop builds and renders frames, so a build is never in
//! flight twice and nothing reads the buffers mid-mutation. The other loops
//! queue their change first and then resume the redraw loop.
//!
//! Keys travel as raw events and are mapped on the redraw loop, against the
//! overlay that is current once every earlier request has been applied.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, PoisonError};
use std::thread;

use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::config::SharedSettings;
use crate::core::timings::TimingsManager;
use crate::engine::state::{lock, ActionContext, Request, Shared};
use crate::ui::compositor::{Compositor, CompositorError};
use crate::ui::keymapper::KeyMapper;
use crate::ui::overlay::{InputBuffer, Overlays};
use crate::ui::renderer::Backend;

/// Errors from one redraw iteration
#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Compositor(#[from] CompositorError),

    #[error("Terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// What the last build was made from
#[derive(Debug, Clone, PartialEq, Eq)]
struct Built {
    overlay: String,
    size: (u16, u16),
}

/// Redraw-side state: the compositor and everything only the redraw loop mutates
pub struct Director {
    compositor: Compositor,
    keymap: KeyMapper,
    base_overlay: String,
    input: InputBuffer,
    settings: SharedSettings,
    timings: TimingsManager,
    built: Option<Built>,
    dirty: bool,
}

impl Director {
    pub fn new(
        compositor: Compositor,
        base_overlay: &str,
        input: InputBuffer,
        settings: SharedSettings,
    ) -> Self {
        let timings = TimingsManager::new(&settings.read().unwrap_or_else(PoisonError::into_inner));
        Self {
            compositor,
            keymap: KeyMapper::new(),
            base_overlay: base_overlay.to_string(),
            input,
            settings,
            timings,
            built: None,
            dirty: true,
        }
    }

    #[cfg(test)]
    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn timings(&self) -> &TimingsManager {
        &self.timings
    }

    /// Overlay that is drawn for the given toggle state
    fn effective_overlay<'a>(&'a self, active: &'a Option<String>) -> &'a str {
        active.as_deref().unwrap_or(&self.base_overlay)
    }

    fn current_overlay(&self, shared: &Shared) -> String {
        let state = lock(&shared.state);
        self.effective_overlay(&state.active_overlay).to_string()
    }

    /// Overlay and size the next build should use
    fn wanted(&self, shared: &Shared) -> Built {
        let state = lock(&shared.state);
        Built {
            overlay: self.effective_overlay(&state.active_overlay).to_string(),
            size: state.last_dimensions,
        }
    }

    /// Whether the current overlay captures free text
    pub fn input_mode(&self, shared: &Shared) -> bool {
        self.compositor
            .overlay(&self.current_overlay(shared))
            .map_or(false, |o| o.captures_text())
    }

    /// Whether the overlay on screen paces by frame interval
    pub fn is_animated(&self) -> bool {
        self.built
            .as_ref()
            .and_then(|b| self.compositor.overlay(&b.overlay))
            .map_or(false, |o| o.is_animated())
    }

    /// Force a rebuild on the next sync
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Switch the active overlay; `None` returns to the base overlay.
    fn set_active(&mut self, shared: &Shared, overlay: Option<String>) {
        let overlay = overlay.filter(|name| *name != self.base_overlay);
        let mut state = lock(&shared.state);
        debug!(
            "Active overlay: {:?} -> {}",
            state.active_overlay,
            overlay.as_deref().unwrap_or(&self.base_overlay)
        );
        state.active_overlay = overlay;
    }

    /// Apply one request
    pub fn apply(&mut self, request: Request, shared: &Shared) {
        trace!("Request: {:?}", request);
        match request {
            Request::Key(event) => {
                let input_mode = self.input_mode(shared);
                match self.keymap.dispatch(&event, input_mode) {
                    Some(request) => self.apply(request, shared),
                    None => trace!("Unbound key {:?} (input mode: {})", event.code, input_mode),
                }
            }
            Request::ToggleOverlay(name) => {
                let active = lock(&shared.state).active_overlay.clone();
                let next = if active.as_deref() == Some(name.as_str()) {
                    None
                } else {
                    Some(name)
                };
                self.set_active(shared, next);
            }
            Request::ShowOverlay(name) => self.set_active(shared, Some(name)),
            Request::Back => {
                if lock(&shared.state).active_overlay.is_some() {
                    self.set_active(shared, None);
                } else {
                    info!("Back on base overlay, exiting");
                    shared.request_exit();
                }
            }
            Request::Navigate(nav) => {
                // The registry must belong to the overlay that is current now
                if self.built.as_ref() != Some(&self.wanted(shared)) {
                    if let Err(e) = self.sync(shared) {
                        debug!("Navigation dropped, overlay not buildable: {}", e);
                        return;
                    }
                }
                let mut ctx = ActionContext::new();
                self.compositor.navigator_mut().navigate(nav, &mut ctx);
                trace!("Focus: {:?}", self.compositor.navigator().focus_index());
                self.apply_all(ctx.into_requests(), shared);
            }
            Request::InputChar(ch) => {
                self.input.push(ch);
                self.dirty = true;
            }
            Request::InputBackspace => {
                self.input.backspace();
                self.dirty = true;
            }
            Request::InputConfirm => {
                let text = self.input.take();
                let overlay = self.current_overlay(shared);
                let handler = self
                    .compositor
                    .overlay(&overlay)
                    .and_then(|o| o.on_submit.clone());
                match handler {
                    Some(handler) => {
                        let mut ctx = ActionContext::new();
                        handler(&text, &mut ctx);
                        self.apply_all(ctx.into_requests(), shared);
                    }
                    None => debug!("Overlay {:?} has no submit handler", overlay),
                }
                self.dirty = true;
            }
            Request::InputCancel => {
                self.input.clear();
                self.set_active(shared, None);
            }
            Request::Refresh => self.dirty = true,
            Request::ReloadSettings => {
                let settings = self
                    .settings
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                self.timings.refresh(&settings);
                shared.set_tick(self.timings.tick());
                self.dirty = true;
            }
            Request::Exit => {
                info!("Exit requested");
                shared.request_exit();
            }
        }
    }

    fn apply_all(&mut self, requests: Vec<Request>, shared: &Shared) {
        for request in requests {
            self.apply(request, shared);
        }
    }

    /// Rebuild if the overlay or terminal size changed since the last build.
    ///
    /// Animated overlays are rebuilt every frame. Returns whether a build happened.
    pub fn sync(&mut self, shared: &Shared) -> Result<bool, CompositorError> {
        let wanted = self.wanted(shared);
        if !self.dirty && !self.is_animated() && self.built.as_ref() == Some(&wanted) {
            return Ok(false);
        }

        if self.compositor.terminal_size() != wanted.size {
            self.compositor.resize(wanted.size.0, wanted.size.1);
            let (width, height) = self.compositor.dimensions();
            debug!("Window resized: W:{} H:{}", width, height);
        }

        // Mark clean first so a failing build is not retried in a tight loop
        self.dirty = false;
        self.built = None;
        let report = self.compositor.build_frame(&wanted.overlay)?;

        for clipped in &report.out_of_bounds {
            warn!(
                "{} #{} in overlay {:?} clipped {} cell(s)",
                clipped.kind, clipped.component, wanted.overlay, clipped.clipped
            );
        }
        trace!(
            "Built {:?} with {} action(s)",
            wanted.overlay,
            report.actions
        );

        self.built = Some(wanted);
        Ok(true)
    }

    /// Clear the terminal and write the current frame
    pub fn present<B: Backend + ?Sized>(&self, backend: &B) -> io::Result<()> {
        let frame = self.compositor.render();
        backend.clear()?;
        backend.write_frame(&frame)
    }

    /// One redraw iteration: drain requests, rebuild if needed, present.
    fn step<B: Backend + ?Sized>(
        &mut self,
        requests: &Receiver<Request>,
        shared: &Shared,
        backend: &B,
    ) -> Result<(), StepError> {
        loop {
            match requests.try_recv() {
                Ok(request) => self.apply(request, shared),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        if shared.should_exit() {
            return Ok(());
        }
        self.sync(shared)?;
        self.present(backend)?;
        Ok(())
    }
}

/// Raises the exit flag when a loop returns or unwinds, so its siblings stop too.
struct ExitGuard<'a>(&'a Shared);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.request_exit();
    }
}

/// Drives a [`Director`] with the redraw, resize-watch and input loops
pub struct Orchestrator<B: Backend> {
    backend: Arc<B>,
    shared: Arc<Shared>,
    director: Director,
}

impl<B: Backend> Orchestrator<B> {
    pub fn new(
        backend: Arc<B>,
        overlays: Overlays,
        base_overlay: &str,
        input: InputBuffer,
        settings: SharedSettings,
    ) -> io::Result<Self> {
        let (cols, rows) = backend.size()?;
        info!("Initial window size: {}x{}", cols, rows);

        let compositor = Compositor::new(cols, rows, overlays);
        let director = Director::new(compositor, base_overlay, input, settings);
        let shared = Arc::new(Shared::new(cols, rows, director.timings().tick()));

        Ok(Self {
            backend,
            shared,
            director,
        })
    }

    /// Handle for observing or stopping a running engine
    #[cfg(test)]
    pub fn shared(&self) -> Arc<Shared> {
        self.shared.clone()
    }

    /// Run all three loops until the exit flag is raised.
    ///
    /// Terminal cleanup is left to the caller.
    pub fn run(self) -> anyhow::Result<()> {
        let Orchestrator {
            backend,
            shared,
            mut director,
        } = self;
        let backend: &B = &backend;
        let shared: &Shared = &shared;
        let (tx, rx) = mpsc::channel();

        info!("Starting engine loops");
        let result = thread::scope(|s| {
            let redraw = s.spawn(move || redraw_loop(&mut director, rx, shared, backend));
            let resize = s.spawn(move || resize_watch_loop(backend, shared));
            let input = s.spawn(move || input_loop(backend, shared, tx));

            let result = match redraw.join() {
                Ok(outcome) => outcome,
                Err(_) => Err(anyhow::anyhow!("redraw loop panicked")),
            };
            for (name, handle) in [("resize", resize), ("input", input)] {
                if handle.join().is_err() {
                    error!("{} loop panicked", name);
                }
            }
            result
        });
        info!("Engine loops stopped");
        result
    }
}

fn redraw_loop<B: Backend + ?Sized>(
    director: &mut Director,
    requests: Receiver<Request>,
    shared: &Shared,
    backend: &B,
) -> anyhow::Result<()> {
    let _guard = ExitGuard(shared);
    // Set after a panicked iteration; a second panic in a row parks instead of retrying
    let mut retrying = false;

    loop {
        if shared.should_exit() {
            return Ok(());
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            director.step(&requests, shared, backend)
        }));
        let mut park = true;
        match outcome {
            Ok(result) => {
                retrying = false;
                match result {
                    Ok(()) => {}
                    Err(StepError::Compositor(e)) => {
                        error!(fatal = true, "Frame build failed: {}", e);
                        return Err(e.into());
                    }
                    Err(StepError::Io(e)) => warn!("Render failed: {}", e),
                }
            }
            Err(_) => {
                director.invalidate();
                if retrying {
                    error!("Redraw iteration panicked again, waiting for the next change");
                } else {
                    // Requests queued behind the failed one still need a pass
                    error!("Redraw iteration panicked, rebuilding");
                    park = false;
                }
                retrying = !retrying;
            }
        }

        if shared.should_exit() {
            return Ok(());
        }

        if director.is_animated() {
            thread::sleep(director.timings().frame());
        } else {
            thread::sleep(director.timings().tick());
            if park {
                shared.pause.wait();
            }
        }
    }
}

fn resize_watch_loop<B: Backend + ?Sized>(backend: &B, shared: &Shared) {
    let _guard = ExitGuard(shared);
    let mut last = shared.snapshot().last_dimensions;

    while !shared.should_exit() {
        match backend.size() {
            Ok(size) if size != last => {
                info!("Resize: {}x{} -> {}x{}", last.0, last.1, size.0, size.1);
                last = size;
                lock(&shared.state).last_dimensions = size;
                shared.pause.resume();
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to read terminal size: {}", e),
        }
        thread::sleep(shared.tick());
    }
}

fn input_loop<B: Backend + ?Sized>(backend: &B, shared: &Shared, requests: Sender<Request>) {
    let _guard = ExitGuard(shared);

    while !shared.should_exit() {
        match backend.read_key(shared.tick()) {
            Ok(Some(key)) => {
                trace!("Key: {:?}", key.code);
                if requests.send(Request::Key(key)).is_err() {
                    return;
                }
                shared.pause.resume();
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to read key: {}", e);
                thread::sleep(shared.tick());
            }
        }
    }
}
