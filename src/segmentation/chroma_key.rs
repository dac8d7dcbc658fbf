use crate::config::ChromaKeyConfig;
use crate::error::OracleError;
use crate::segmentation::{MaskOracle, ProbabilityMap};
use crate::video::types::Frame;

/// Deterministic oracle that treats pixels close to a backdrop color as background
///
/// Pixels within `tolerance` (Euclidean RGB distance) of the key color have a
/// foreground probability of 0. Beyond that the probability ramps linearly to
/// 1 over `softness`; a softness of 0 gives a hard edge.
pub struct ChromaKeyOracle {
    key_color: [f32; 3],
    tolerance: f32,
    softness: f32,
}

impl ChromaKeyOracle {
    pub fn new(key_color: [u8; 3], tolerance: f32, softness: f32) -> Self {
        Self {
            key_color: key_color.map(f32::from),
            tolerance,
            softness,
        }
    }

    pub fn from_config(config: &ChromaKeyConfig) -> Self {
        Self::new(config.key_color, config.tolerance, config.softness)
    }

    fn foreground_probability(&self, pixel: [u8; 3]) -> f32 {
        let distance = pixel
            .iter()
            .zip(self.key_color.iter())
            .map(|(&p, &k)| {
                let d = f32::from(p) - k;
                d * d
            })
            .sum::<f32>()
            .sqrt();

        if distance <= self.tolerance {
            0.0
        } else if self.softness <= f32::EPSILON {
            1.0
        } else {
            ((distance - self.tolerance) / self.softness).min(1.0)
        }
    }
}

impl Default for ChromaKeyOracle {
    fn default() -> Self {
        Self::from_config(&ChromaKeyConfig::default())
    }
}

impl MaskOracle for ChromaKeyOracle {
    fn name(&self) -> &str {
        "chroma-key"
    }

    fn predict(&mut self, frame: &Frame) -> Result<Option<ProbabilityMap>, OracleError> {
        let image = frame.as_image();
        let map = ProbabilityMap::from_fn(frame.width(), frame.height(), |x, y| {
            self.foreground_probability(image.get_pixel(x, y).0)
        });
        Ok(Some(map))
    }
}
