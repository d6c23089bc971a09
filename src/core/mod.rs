//! Core timing values derived from settings.
//!
//! - **timings**: tick and frame intervals the engine loops pace themselves by

pub mod timings;
