//! # bgswap
//!
//! Replace the background of a video while keeping its audio track.
//!
//! Every frame is segmented by a mask oracle, the background pixels are
//! replaced with a solid color, a still image or zeros, and the original audio
//! is remuxed onto the result with `ffmpeg`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgswap::{background::Background, config::Config, replacement::ReplacementEngine};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut engine = ReplacementEngine::from_config(Config::default())?;
//! let report = engine.process("talk.mp4", "talk_green.mp4", Background::SolidColor([0, 255, 0]))?;
//! println!("{} frames written", report.frames_processed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`video`] - Frames, format resolution, ffmpeg I/O and the frame pipeline
//! - [`segmentation`] - Mask oracles that decide which pixels are foreground
//! - [`background`] - Background policies and the compositor
//! - [`audio`] - Audio extraction and remuxing
//! - [`replacement`] - The engine tying one run together
//! - [`config`] - Configuration management
//!
//! ## Custom Oracles
//!
//! Any segmentation model can drive the pipeline by implementing
//! [`MaskOracle`](segmentation::MaskOracle):
//!
//! ```rust,no_run
//! use bgswap::error::OracleError;
//! use bgswap::segmentation::{MaskOracle, ProbabilityMap};
//! use bgswap::video::Frame;
//!
//! struct KeepLeftHalf;
//!
//! impl MaskOracle for KeepLeftHalf {
//!     fn name(&self) -> &str {
//!         "keep-left-half"
//!     }
//!
//!     fn predict(&mut self, frame: &Frame) -> Result<Option<ProbabilityMap>, OracleError> {
//!         let half = frame.width() / 2;
//!         Ok(Some(ProbabilityMap::from_fn(frame.width(), frame.height(), |x, _| {
//!             if x < half { 1.0 } else { 0.0 }
//!         })))
//!     }
//! }
//! ```

pub mod audio;
pub mod background;
pub mod config;
pub mod error;
pub mod replacement;
pub mod segmentation;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    background::Background,
    config::Config,
    error::{ErrorKind, ProcessError, Result},
    replacement::{ReplacementEngine, RunReport},
    segmentation::{MaskOracle, OracleRegistry},
};
