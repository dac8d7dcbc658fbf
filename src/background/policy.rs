use std::path::Path;

use image::{imageops, RgbImage};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Replacement strategy for background pixels
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    /// Fill the background with one RGB color
    SolidColor([u8; 3]),
    /// Show a still image behind the foreground
    Image(RgbImage),
    /// Clear the background to zero
    ///
    /// The output stays 3-channel, so "transparent" pixels come out black.
    Transparent,
}

impl Background {
    /// Load a still background image from disk
    pub fn from_image_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| ConfigError::InvalidValue {
            key: "background.image".to_string(),
            value: format!("{}: {}", path.display(), e),
        })?;
        Ok(Self::Image(image.to_rgb8()))
    }

    /// Parse `"r,g,b"` or `"#rrggbb"` into an RGB triple
    pub fn parse_color(value: &str) -> Result<[u8; 3]> {
        let invalid = || ConfigError::InvalidValue {
            key: "background.color".to_string(),
            value: value.to_string(),
        };
        let trimmed = value.trim();

        if let Some(hex) = trimmed.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(invalid().into());
            }
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
            return Ok([channel(0)?, channel(2)?, channel(4)?]);
        }

        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(invalid().into());
        }
        let mut color = [0u8; 3];
        for (slot, part) in color.iter_mut().zip(parts) {
            *slot = part.parse().map_err(|_| invalid())?;
        }
        Ok(color)
    }

    /// Fix the background to the stream's dimensions
    ///
    /// Images are resized here, once per run, never per frame.
    pub fn prepare(self, width: u32, height: u32) -> PreparedBackground {
        match self {
            Self::SolidColor(color) => PreparedBackground::SolidColor(color),
            Self::Transparent => PreparedBackground::Transparent,
            Self::Image(image) if image.dimensions() == (width, height) => PreparedBackground::Image(image),
            Self::Image(image) => {
                debug!(
                    "Resizing background image from {}x{} to {}x{}",
                    image.width(), image.height(), width, height
                );
                let resized = imageops::resize(&image, width, height, imageops::FilterType::Triangle);
                PreparedBackground::Image(resized)
            }
        }
    }
}

impl Default for Background {
    /// Green screen, the historical default
    fn default() -> Self {
        Self::SolidColor([0, 255, 0])
    }
}

/// A [`Background`] that matches the stream's dimensions
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedBackground {
    SolidColor([u8; 3]),
    Image(RgbImage),
    Transparent,
}
