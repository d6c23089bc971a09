//! Compositing, overlays and terminal I/O.
//!
//! This module provides everything between an overlay description and the bytes
//! written to the terminal:
//!
//! - **overlay**: declarative overlay components and the overlay registry
//! - **navigation**: focus state machine and the per-frame action registry
//! - **compositor**: brightness and glyph buffers, layout, ANSI rendering
//! - **keymapper**: key events to engine requests
//! - **renderer**: crossterm terminal backend
//!
//! # Frame Pipeline
//!
//! ```text
//! Overlay ──build_frame──> Canvas (brightness + glyphs) ──render──> ANSI frame
//!                 └──> ActionRegistry ──> Navigator (focus)
//! ```

pub mod compositor;
pub mod keymapper;
pub mod navigation;
pub mod overlay;
pub mod renderer;
