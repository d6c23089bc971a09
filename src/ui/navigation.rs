//! Button focus and activation.
//!
//! Each frame build harvests the active overlay's button actions into an
//! [`ActionRegistry`], in layout order, and resets focus to the first entry.
//! Whether the overlay is navigable at all is decided once per build:
//!
//! ```text
//! Unlocked ── up/down/enter are no-ops
//! Lockable { index } ── up/down saturate at 0 and len-1, enter runs entry `index`
//! ```

use std::fmt;

use tracing::{debug, trace};

use crate::engine::state::ActionContext;
use crate::ui::overlay::Action;

/// Navigation input forwarded from the key table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Up,
    Down,
    Left,
    Right,
    Enter,
}

/// Glyph cells covered by a button label after layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphSpan {
    pub row: usize,
    pub col: usize,
    pub len: usize,
}

impl GlyphSpan {
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row == self.row && col >= self.col && col < self.col + self.len
    }
}

/// One harvested button
#[derive(Clone)]
pub struct RegisteredAction {
    pub action: Action,
    pub span: GlyphSpan,
}

impl fmt::Debug for RegisteredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredAction")
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}

/// Actions of the most recently built overlay, in layout order
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    entries: Vec<RegisteredAction>,
}

impl ActionRegistry {
    pub fn push(&mut self, action: Action, span: GlyphSpan) {
        self.entries.push(RegisteredAction { action, span });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RegisteredAction> {
        self.entries.get(index)
    }
}

/// Focus state for the active overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState {
    Unlocked,
    Lockable { index: usize },
}

/// Focus machine plus the registry it navigates
#[derive(Debug, Clone)]
pub struct Navigator {
    state: FocusState,
    registry: ActionRegistry,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            state: FocusState::Unlocked,
            registry: ActionRegistry::default(),
        }
    }

    /// Start a new build: empty registry, focus back to the first entry.
    pub fn reset(&mut self, lockable: bool) {
        self.registry.clear();
        self.state = if lockable {
            FocusState::Lockable { index: 0 }
        } else {
            FocusState::Unlocked
        };
    }

    pub fn register(&mut self, action: Action, span: GlyphSpan) {
        self.registry.push(action, span);
    }

    #[cfg(test)]
    pub fn state(&self) -> FocusState {
        self.state
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Current focus index, if the overlay is navigable and has actions
    pub fn focus_index(&self) -> Option<usize> {
        match self.state {
            FocusState::Lockable { index } if !self.registry.is_empty() => Some(index),
            _ => None,
        }
    }

    /// Span of the focused button, used for highlighting
    pub fn focused_span(&self) -> Option<GlyphSpan> {
        self.focus_index()
            .and_then(|i| self.registry.get(i))
            .map(|entry| entry.span)
    }

    /// Move focus to the next action, holding at the last one
    pub fn focus_next(&mut self) {
        let last = self.registry.len().saturating_sub(1);
        match &mut self.state {
            FocusState::Lockable { index } if !self.registry.is_empty() => {
                if *index < last {
                    *index += 1;
                }
                trace!("Focus next -> {}", index);
            }
            _ => debug!("Focus next ignored: overlay not navigable"),
        }
    }

    /// Move focus to the previous action, holding at the first one
    pub fn focus_prev(&mut self) {
        match &mut self.state {
            FocusState::Lockable { index } if !self.registry.is_empty() => {
                *index = index.saturating_sub(1);
                trace!("Focus prev -> {}", index);
            }
            _ => debug!("Focus prev ignored: overlay not navigable"),
        }
    }

    /// Run the focused action once. Returns whether anything ran.
    pub fn activate(&self, ctx: &mut ActionContext) -> bool {
        match self.focus_index().and_then(|i| self.registry.get(i)) {
            Some(entry) => {
                (entry.action)(ctx);
                true
            }
            None => {
                debug!("Activate ignored: nothing to activate");
                false
            }
        }
    }

    /// Dispatch a navigation input. Left/right have no binding yet.
    pub fn navigate(&mut self, nav: Navigation, ctx: &mut ActionContext) -> bool {
        match nav {
            Navigation::Up => {
                self.focus_prev();
                true
            }
            Navigation::Down => {
                self.focus_next();
                true
            }
            Navigation::Enter => self.activate(ctx),
            Navigation::Left | Navigation::Right => {
                trace!("Unbound navigation {:?}", nav);
                false
            }
        }
    }
}
