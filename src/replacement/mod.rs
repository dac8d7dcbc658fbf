//! # Replacement Engine
//!
//! Runs one complete background replacement: frame processing into a
//! temporary silent video, then audio remux into the final output.

pub mod engine;
pub mod scratch;

pub use engine::{ReplacementEngine, RunReport};
pub use scratch::{CleanupWarning, ScratchFiles};
