//! # Audio Remux Module
//!
//! Carries the input's audio track over to the processed video using the
//! external encoder. Every invocation goes through a [`ToolRunner`] so the
//! encoder can be substituted.

pub mod remux;
pub mod tool;

pub use remux::{AudioOutcome, RemuxOrchestrator};
pub use tool::{ProcessToolRunner, ToolOutcome, ToolRunner};
