use std::path::{Path, PathBuf};

use image::{imageops, GrayImage, Luma};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use tracing::{debug, info};

use crate::config::OnnxConfig;
use crate::error::OracleError;
use crate::segmentation::{MaskOracle, ProbabilityMap};
use crate::video::types::Frame;

/// Segmentation model executed with ONNX Runtime
///
/// Expects a single NCHW float input in `[0, 1]` and produces a single
/// foreground map, either `[1, 1, H, W]` or `[1, H, W, 1]`. The session is
/// created when streaming starts and dropped when it ends.
pub struct OnnxSegmenter {
    model_path: PathBuf,
    input_width: u32,
    input_height: u32,
    session: Option<Session>,
}

impl OnnxSegmenter {
    pub fn new<P: AsRef<Path>>(model_path: P, input_width: u32, input_height: u32) -> Result<Self, OracleError> {
        let model_path = model_path.as_ref().to_path_buf();
        if !model_path.is_file() {
            return Err(OracleError::LoadFailed {
                path: model_path.display().to_string(),
                reason: "model file not found".to_string(),
            });
        }

        Ok(Self {
            model_path,
            input_width,
            input_height,
            session: None,
        })
    }

    pub fn from_config(config: &OnnxConfig) -> Result<Self, OracleError> {
        let path = config.model_path.as_ref().ok_or_else(|| OracleError::LoadFailed {
            path: "<unset>".to_string(),
            reason: "segmentation.onnx.model_path is required for the onnx oracle".to_string(),
        })?;
        Self::new(path, config.input_width, config.input_height)
    }

    fn load_failed(&self, e: impl std::fmt::Display) -> OracleError {
        OracleError::LoadFailed {
            path: self.model_path.display().to_string(),
            reason: e.to_string(),
        }
    }

    fn inference_failed(e: impl std::fmt::Display) -> OracleError {
        OracleError::InferenceFailed { reason: e.to_string() }
    }

    /// Resize to the model input and convert to a normalized NCHW tensor
    fn preprocess(&self, frame: &Frame) -> Array4<f32> {
        let resized = imageops::resize(
            frame.as_image(),
            self.input_width,
            self.input_height,
            imageops::FilterType::Triangle,
        );

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = f32::from(pixel[c]) / 255.0;
            }
        }
        tensor
    }

    /// Resize a model-resolution matte back to frame resolution
    fn postprocess(matte: &[f32], width: u32, height: u32, target: (u32, u32)) -> Option<ProbabilityMap> {
        if (width, height) == target {
            return ProbabilityMap::new(width, height, matte.to_vec());
        }

        let gray = GrayImage::from_fn(width, height, |x, y| {
            let idx = (y * width + x) as usize;
            let value = matte.get(idx).copied().unwrap_or(0.0);
            Luma([(value * 255.0).clamp(0.0, 255.0) as u8])
        });
        let resized = imageops::resize(&gray, target.0, target.1, imageops::FilterType::Triangle);
        let values = resized.pixels().map(|p| f32::from(p[0]) / 255.0).collect();
        ProbabilityMap::new(target.0, target.1, values)
    }
}

impl MaskOracle for OnnxSegmenter {
    fn name(&self) -> &str {
        "onnx"
    }

    fn start(&mut self) -> Result<(), OracleError> {
        if self.session.is_some() {
            return Ok(());
        }

        info!("Loading segmentation model from {}", self.model_path.display());
        let session = Session::builder()
            .map_err(|e| self.load_failed(e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| self.load_failed(e))?
            .commit_from_file(&self.model_path)
            .map_err(|e| self.load_failed(e))?;

        self.session = Some(session);
        Ok(())
    }

    fn predict(&mut self, frame: &Frame) -> Result<Option<ProbabilityMap>, OracleError> {
        let input = self.preprocess(frame);
        let session = self.session.as_mut().ok_or_else(|| OracleError::InferenceFailed {
            reason: "model session not started".to_string(),
        })?;

        let input_value = Value::from_array(input).map_err(Self::inference_failed)?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(Self::inference_failed)?;

        let keys: Vec<_> = outputs.keys().collect();
        let Some(first_key) = keys.first() else {
            return Ok(None);
        };
        let tensor = outputs
            .get(first_key)
            .ok_or_else(|| Self::inference_failed("first output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(Self::inference_failed)?;

        let shape = tensor.shape().to_vec();
        let (height, width) = match shape.as_slice() {
            [1, 1, h, w] => (*h, *w),
            [1, h, w, 1] => (*h, *w),
            [1, h, w] => (*h, *w),
            other => {
                debug!("Unexpected segmentation output shape {:?}, skipping frame", other);
                return Ok(None);
            }
        };

        let matte: Vec<f32> = tensor.iter().copied().collect();
        Ok(Self::postprocess(&matte, width as u32, height as u32, frame.dimensions()))
    }

    fn finish(&mut self) {
        if self.session.take().is_some() {
            debug!("Released segmentation model session");
        }
    }
}
