//! Key mapping for engine input
//!
//! Converts key events to engine requests: overlay toggles, navigation, and
//! free-text editing while a text-input overlay is active.

use std::collections::HashMap;

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::engine::state::Request;
use crate::ui::navigation::Navigation;

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Lookup key: the code plus normalized modifiers.
///
/// Shift is dropped for character keys since it is already reflected in the
/// character itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Chord {
    code: KeyCode,
    mods: Modifiers,
}

impl Chord {
    fn new(code: KeyCode, mods: Modifiers) -> Self {
        let mods = match code {
            KeyCode::Char(_) => mods - Modifiers::SHIFT,
            _ => mods,
        };
        Self { code, mods }
    }
}

impl From<&KeyEvent> for Chord {
    fn from(event: &KeyEvent) -> Self {
        Self::new(event.code, Modifiers::from(event.modifiers))
    }
}

/// Key-to-request table
#[derive(Debug, Clone)]
pub struct KeyMapper {
    bindings: HashMap<Chord, Request>,
}

impl Default for KeyMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyMapper {
    /// Default bindings
    pub fn new() -> Self {
        let mut mapper = Self {
            bindings: HashMap::new(),
        };
        mapper
            .bind(KeyCode::Esc, Modifiers::empty(), Request::Back)
            .bind(KeyCode::Char('c'), Modifiers::CTRL, Request::Exit)
            .bind(KeyCode::F(1), Modifiers::empty(), Request::ToggleOverlay("Debug".into()))
            .bind(KeyCode::F(2), Modifiers::empty(), Request::ShowOverlay("Settings".into()))
            .bind(KeyCode::F(3), Modifiers::empty(), Request::ToggleOverlay("DetailedDebug".into()))
            .bind(KeyCode::Char('q'), Modifiers::empty(), Request::ToggleOverlay("Help".into()))
            .bind(KeyCode::Char('Q'), Modifiers::empty(), Request::ToggleOverlay("Help".into()))
            .bind(KeyCode::Up, Modifiers::empty(), Request::Navigate(Navigation::Up))
            .bind(KeyCode::Down, Modifiers::empty(), Request::Navigate(Navigation::Down))
            .bind(KeyCode::Left, Modifiers::empty(), Request::Navigate(Navigation::Left))
            .bind(KeyCode::Right, Modifiers::empty(), Request::Navigate(Navigation::Right))
            .bind(KeyCode::Enter, Modifiers::empty(), Request::Navigate(Navigation::Enter));
        mapper
    }

    /// Add or replace a binding
    pub fn bind(&mut self, code: KeyCode, mods: Modifiers, request: Request) -> &mut Self {
        self.bindings.insert(Chord::new(code, mods), request);
        self
    }

    /// Map a key event in normal (navigation) mode
    pub fn map(&self, event: &KeyEvent) -> Option<Request> {
        self.bindings.get(&Chord::from(event)).cloned()
    }

    /// Map a key event while a text-input overlay is active
    pub fn map_text_input(event: &KeyEvent) -> Option<Request> {
        let mods = Modifiers::from(event.modifiers);
        match event.code {
            KeyCode::Char('c') if mods.contains(Modifiers::CTRL) => Some(Request::Exit),
            KeyCode::Char(ch) if !mods.intersects(Modifiers::CTRL | Modifiers::ALT) => {
                Some(Request::InputChar(ch))
            }
            KeyCode::Backspace => Some(Request::InputBackspace),
            KeyCode::Enter => Some(Request::InputConfirm),
            KeyCode::Esc => Some(Request::InputCancel),
            _ => None,
        }
    }

    /// Map a key event for the current mode
    pub fn dispatch(&self, event: &KeyEvent, input_mode: bool) -> Option<Request> {
        if input_mode {
            Self::map_text_input(event)
        } else {
            self.map(event)
        }
    }
}
