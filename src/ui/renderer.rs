//! Terminal I/O using crossterm
//!
//! The engine talks to the terminal through [`Backend`] so the loops can be
//! driven by a scripted terminal in tests.

use std::io::{self, Write};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use std::time::Duration;

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyEvent, KeyEventKind},
    execute,
    style::{Attribute, ResetColor, SetAttribute},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use tracing::{debug, error};

/// Terminal operations the engine needs.
///
/// All methods take `&self`: the three loops share one backend.
pub trait Backend: Send + Sync {
    /// Current terminal size (cols, rows)
    fn size(&self) -> io::Result<(u16, u16)>;

    /// Wait up to `timeout` for a key press
    fn read_key(&self, timeout: Duration) -> io::Result<Option<KeyEvent>>;

    /// Clear the screen and scrollback, cursor home
    fn clear(&self) -> io::Result<()>;

    /// Write one complete frame in a single call
    fn write_frame(&self, frame: &str) -> io::Result<()>;
}

static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Route panic reports into the log.
///
/// The default hook writes to stderr, which lands on the alternate screen in
/// the middle of a frame. It is still called once raw mode is off, so a panic
/// outside the engine stays visible on the restored terminal.
pub fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            error!("Panic: {}", info);
            if matches!(terminal::is_raw_mode_enabled(), Ok(false)) {
                original(info);
            }
        }));
    });
}

/// The real terminal
pub struct Terminal {
    /// Whether the terminal has been initialized
    initialized: AtomicBool,
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&self) -> io::Result<()> {
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            DisableLineWrap,
            Hide,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        stdout.flush()?;

        self.initialized.store(true, Ordering::SeqCst);
        debug!("Terminal initialized");
        Ok(())
    }

    /// Cleanup the terminal
    pub fn cleanup(&self) -> io::Result<()> {
        if !self.initialized.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let mut stdout = io::stdout();

        // Reset all attributes first
        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset));
        let _ = execute!(stdout, Show);
        let _ = execute!(stdout, EnableLineWrap);
        let _ = execute!(stdout, LeaveAlternateScreen);
        let _ = stdout.flush();

        // Disable raw mode - this is the most important part
        terminal::disable_raw_mode()?;

        debug!("Terminal restored");
        Ok(())
    }
}

impl Backend for Terminal {
    fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }

    fn read_key(&self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            // Windows reports releases too
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key)),
            _ => Ok(None),
        }
    }

    fn clear(&self) -> io::Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Clear(ClearType::All), Clear(ClearType::Purge), MoveTo(0, 0))
    }

    fn write_frame(&self, frame: &str) -> io::Result<()> {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();
        stdout.write_all(frame.as_bytes())?;
        stdout.flush()
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Scripted terminal for driving the engine in tests
#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::engine::state::lock;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockBackend {
        size: Mutex<(u16, u16)>,
        keys: Mutex<VecDeque<KeyEvent>>,
        frames: Mutex<Vec<String>>,
        clears: Mutex<usize>,
    }

    impl MockBackend {
        pub fn new(cols: u16, rows: u16) -> Self {
            Self {
                size: Mutex::new((cols, rows)),
                ..Self::default()
            }
        }

        pub fn set_size(&self, cols: u16, rows: u16) {
            *lock(&self.size) = (cols, rows);
        }

        pub fn press(&self, key: KeyEvent) {
            lock(&self.keys).push_back(key);
        }

        pub fn frames(&self) -> Vec<String> {
            lock(&self.frames).clone()
        }

        pub fn frame_count(&self) -> usize {
            lock(&self.frames).len()
        }

        pub fn last_frame(&self) -> Option<String> {
            lock(&self.frames).last().cloned()
        }

        pub fn clears(&self) -> usize {
            *lock(&self.clears)
        }
    }

    impl Backend for MockBackend {
        fn size(&self) -> io::Result<(u16, u16)> {
            Ok(*lock(&self.size))
        }

        fn read_key(&self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
            if let Some(key) = lock(&self.keys).pop_front() {
                return Ok(Some(key));
            }
            std::thread::sleep(timeout);
            Ok(None)
        }

        fn clear(&self) -> io::Result<()> {
            *lock(&self.clears) += 1;
            Ok(())
        }

        fn write_frame(&self, frame: &str) -> io::Result<()> {
            lock(&self.frames).push(frame.to_string());
            Ok(())
        }
    }
}
