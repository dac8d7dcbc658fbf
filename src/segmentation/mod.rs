//! # Segmentation
//!
//! The mask oracle seam. A segmentation model is anything that turns an RGB
//! frame into a per-pixel foreground probability map, or declines to.
//!
//! ## Built-in Oracles
//!
//! - **chroma-key**: keys out a backdrop color; deterministic, no model file
//! - **onnx**: runs an ONNX segmentation model (requires the `onnx` feature)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bgswap::{config::SegmentationConfig, segmentation::OracleRegistry};
//!
//! let registry = OracleRegistry::new();
//! let oracle = registry.create("chroma-key", &SegmentationConfig::default()).unwrap();
//! assert_eq!(oracle.name(), "chroma-key");
//! ```

pub mod chroma_key;
pub mod mask;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod registry;

pub use chroma_key::ChromaKeyOracle;
pub use mask::{Mask, ProbabilityMap, FOREGROUND_THRESHOLD};
#[cfg(feature = "onnx")]
pub use onnx::OnnxSegmenter;
pub use registry::OracleRegistry;

use crate::error::OracleError;
use crate::video::types::Frame;

/// Trait for segmentation models
pub trait MaskOracle: Send {
    /// Returns the unique name of this oracle
    fn name(&self) -> &str;

    /// Acquire whatever the model needs for a run
    ///
    /// Called once when the pipeline starts streaming. Paired with
    /// [`finish`](MaskOracle::finish), which is called on every exit from
    /// streaming, successful or not.
    fn start(&mut self) -> Result<(), OracleError> {
        Ok(())
    }

    /// Predict the foreground probability for every pixel of `frame`
    ///
    /// `frame` is in RGB channel order. Returning `Ok(None)` means the model
    /// produced no usable result and the frame is skipped. An `Err` aborts the
    /// run.
    fn predict(&mut self, frame: &Frame) -> Result<Option<ProbabilityMap>, OracleError>;

    /// Release per-run resources
    fn finish(&mut self) {}
}
