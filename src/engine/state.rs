//! Shared render state and the messages the loops exchange.
//!
//! Only the redraw loop touches the compositor. The resize-watch and input loops
//! communicate through three channels:
//!
//! - `RenderState` for the handful of values every loop reads
//! - a request queue drained by the redraw loop
//! - the `PauseSignal` that parks and wakes the redraw loop

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossterm::event::KeyEvent;
use tracing::trace;

use crate::ui::navigation::Navigation;

/// Lock a mutex, recovering the data if another thread panicked while holding it.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A change the redraw loop applies before its next frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Raw key press, mapped against the overlay current when it is applied
    Key(KeyEvent),
    /// Toggle an overlay against the base overlay
    ToggleOverlay(String),
    /// Make an overlay active
    ShowOverlay(String),
    /// Return to the base overlay, or exit if already there
    Back,
    /// Focus navigation / activation
    Navigate(Navigation),
    /// Append a character to the text input buffer
    InputChar(char),
    /// Delete the last character of the text input buffer
    InputBackspace,
    /// Submit the text input buffer
    InputConfirm,
    /// Discard the text input buffer and return to the base overlay
    InputCancel,
    /// Rebuild the frame so dynamic text is re-evaluated
    Refresh,
    /// Re-read the settings and recompute timings
    ReloadSettings,
    /// Stop all loops
    Exit,
}

/// Collects the requests an action or submit handler issues.
///
/// Actions run on the redraw loop; their requests are applied right after they return.
#[derive(Debug, Default)]
pub struct ActionContext {
    requests: Vec<Request>,
}

impl ActionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, overlay: &str) {
        self.requests.push(Request::ShowOverlay(overlay.to_string()));
    }

    pub fn toggle(&mut self, overlay: &str) {
        self.requests.push(Request::ToggleOverlay(overlay.to_string()));
    }

    /// Return to the base overlay
    pub fn close(&mut self) {
        self.requests.push(Request::Back);
    }

    pub fn refresh(&mut self) {
        self.requests.push(Request::Refresh);
    }

    pub fn reload_settings(&mut self) {
        self.requests.push(Request::ReloadSettings);
    }

    pub fn exit(&mut self) {
        self.requests.push(Request::Exit);
    }

    pub fn into_requests(self) -> Vec<Request> {
        self.requests
    }
}

/// Values shared by all three loops.
///
/// Focus lives in the compositor's navigator, which only the redraw loop touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderState {
    /// Toggled overlay; `None` means the base overlay
    pub active_overlay: Option<String>,
    /// Terminal size as last seen by the resize watcher (cols, rows)
    pub last_dimensions: (u16, u16),
}

impl RenderState {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            active_overlay: None,
            last_dimensions: (cols, rows),
        }
    }
}

/// Resettable gate the redraw loop parks on.
///
/// `resume` latches, so a resume issued before the redraw loop reaches `wait`
/// is not lost.
#[derive(Debug, Default)]
pub struct PauseSignal {
    resumed: Mutex<bool>,
    cond: Condvar,
    parked: AtomicBool,
}

impl PauseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until resumed, then re-arm.
    pub fn wait(&self) {
        let mut resumed = lock(&self.resumed);
        self.parked.store(true, Ordering::SeqCst);
        while !*resumed {
            resumed = self.cond.wait(resumed).unwrap_or_else(PoisonError::into_inner);
        }
        *resumed = false;
        self.parked.store(false, Ordering::SeqCst);
    }

    /// Wake the redraw loop (or let its next `wait` pass through).
    pub fn resume(&self) {
        let mut resumed = lock(&self.resumed);
        if self.is_suspended() {
            trace!("Waking parked redraw loop");
        }
        *resumed = true;
        self.cond.notify_all();
    }

    /// Whether the redraw loop is currently parked
    pub fn is_suspended(&self) -> bool {
        self.parked.load(Ordering::SeqCst)
    }
}

/// Everything the loops share
#[derive(Debug)]
pub struct Shared {
    pub state: Mutex<RenderState>,
    pub pause: PauseSignal,
    exit: AtomicBool,
    /// Current tick interval, republished on settings reload
    tick_ms: AtomicU64,
}

impl Shared {
    pub fn new(cols: u16, rows: u16, tick: Duration) -> Self {
        Self {
            state: Mutex::new(RenderState::new(cols, rows)),
            pause: PauseSignal::new(),
            exit: AtomicBool::new(false),
            tick_ms: AtomicU64::new(tick.as_millis() as u64),
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.load(Ordering::SeqCst))
    }

    pub fn set_tick(&self, tick: Duration) {
        self.tick_ms.store(tick.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn should_exit(&self) -> bool {
        self.exit.load(Ordering::SeqCst)
    }

    /// Raise the exit flag and unpark the redraw loop so it can observe it.
    pub fn request_exit(&self) {
        self.exit.store(true, Ordering::SeqCst);
        self.pause.resume();
    }

    pub fn snapshot(&self) -> RenderState {
        lock(&self.state).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_resume_before_wait_is_latched() {
        let pause = PauseSignal::new();
        pause.resume();
        // Returns immediately instead of blocking
        pause.wait();
        assert!(!pause.is_suspended());
    }

    #[test]
    fn test_wait_parks_until_resumed() {
        let pause = Arc::new(PauseSignal::new());
        let waiter = {
            let pause = pause.clone();
            thread::spawn(move || pause.wait())
        };

        let mut parked = false;
        for _ in 0..100 {
            if pause.is_suspended() {
                parked = true;
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(parked);

        pause.resume();
        waiter.join().unwrap();
        assert!(!pause.is_suspended());
    }

    #[test]
    fn test_request_exit_unparks() {
        let shared = Arc::new(Shared::new(80, 24, Duration::from_millis(100)));
        let waiter = {
            let shared = shared.clone();
            thread::spawn(move || shared.pause.wait())
        };
        shared.request_exit();
        waiter.join().unwrap();
        assert!(shared.should_exit());
    }

    #[test]
    fn test_action_context_preserves_order() {
        let mut ctx = ActionContext::new();
        ctx.show("Settings");
        ctx.refresh();
        ctx.exit();
        assert_eq!(
            ctx.into_requests(),
            vec![
                Request::ShowOverlay("Settings".to_string()),
                Request::Refresh,
                Request::Exit,
            ]
        );
    }
}
