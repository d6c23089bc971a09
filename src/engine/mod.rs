//! The concurrent engine: shared state and the loops that drive the compositor.
//!
//! - **state**: requests, render state and the pause signal shared by the loops
//! - **orchestrator**: the redraw, resize-watch and input loops

pub mod orchestrator;
pub mod state;
