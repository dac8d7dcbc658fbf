use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for bgswap
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External encoder settings
    pub encoder: EncoderConfig,

    /// Frame loop settings
    pub pipeline: PipelineConfig,

    /// Temporary artifact settings
    pub temp: TempConfig,

    /// Segmentation oracle selection and tuning
    pub segmentation: SegmentationConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.encoder.validate()?;
        self.pipeline.validate()?;
        self.temp.validate()?;
        self.segmentation.validate()?;
        Ok(())
    }
}

/// ffmpeg log levels accepted by `-v`
const FFMPEG_LOG_LEVELS: &[&str] = &[
    "quiet", "panic", "fatal", "error", "warning", "info", "verbose", "debug", "trace",
];

/// External encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Encoder executable used for decoding, encoding and remuxing
    pub program: String,

    /// Prober executable used to read stream properties
    pub probe_program: String,

    /// Value passed to the encoder's `-v` flag
    pub log_level: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            probe_program: "ffprobe".to_string(),
            log_level: "error".to_string(),
        }
    }
}

impl EncoderConfig {
    fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "encoder.program".to_string(),
                value: self.program.clone()
            }.into());
        }

        if self.probe_program.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "encoder.probe_program".to_string(),
                value: self.probe_program.clone()
            }.into());
        }

        if !FFMPEG_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "encoder.log_level".to_string(),
                value: self.log_level.clone()
            }.into());
        }

        Ok(())
    }
}

/// Frame loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frames between progress log lines
    pub progress_interval: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { progress_interval: 30 }
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<()> {
        if self.progress_interval == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.progress_interval".to_string(),
                value: self.progress_interval.to_string()
            }.into());
        }
        Ok(())
    }
}

/// Temporary artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TempConfig {
    /// Directory for temporary artifacts; the system temp dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// File name prefix for temporary artifacts
    pub prefix: String,
}

impl Default for TempConfig {
    fn default() -> Self {
        Self {
            directory: None,
            prefix: "bgswap-".to_string(),
        }
    }
}

impl TempConfig {
    fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() || self.prefix.contains(std::path::is_separator) {
            return Err(ConfigError::InvalidValue {
                key: "temp.prefix".to_string(),
                value: self.prefix.clone()
            }.into());
        }
        Ok(())
    }
}

/// Segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Name of the oracle to use (see [`crate::segmentation::OracleRegistry`])
    pub oracle: String,

    pub chroma_key: ChromaKeyConfig,

    pub onnx: OnnxConfig,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            oracle: "chroma-key".to_string(),
            chroma_key: ChromaKeyConfig::default(),
            onnx: OnnxConfig::default(),
        }
    }
}

impl SegmentationConfig {
    fn validate(&self) -> Result<()> {
        if self.oracle.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "segmentation.oracle".to_string(),
                value: self.oracle.clone()
            }.into());
        }
        self.chroma_key.validate()?;
        self.onnx.validate()?;
        Ok(())
    }
}

/// Largest possible distance between two RGB colors
pub const MAX_RGB_DISTANCE: f32 = 441.673;

/// Chroma key oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaKeyConfig {
    /// Backdrop color to key out
    pub key_color: [u8; 3],

    /// RGB distance up to which a pixel is pure background
    pub tolerance: f32,

    /// Width of the ramp from background to foreground beyond `tolerance`
    pub softness: f32,
}

impl Default for ChromaKeyConfig {
    fn default() -> Self {
        Self {
            key_color: [0, 177, 64],
            tolerance: 90.0,
            softness: 40.0,
        }
    }
}

impl ChromaKeyConfig {
    fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0 && self.tolerance <= MAX_RGB_DISTANCE) {
            return Err(ConfigError::InvalidValue {
                key: "segmentation.chroma_key.tolerance".to_string(),
                value: self.tolerance.to_string()
            }.into());
        }

        if !(self.softness >= 0.0 && self.softness.is_finite()) {
            return Err(ConfigError::InvalidValue {
                key: "segmentation.chroma_key.softness".to_string(),
                value: self.softness.to_string()
            }.into());
        }

        Ok(())
    }
}

/// ONNX segmentation model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnnxConfig {
    /// Path to the `.onnx` model file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    /// Model input width in pixels
    pub input_width: u32,

    /// Model input height in pixels
    pub input_height: u32,
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            input_width: 256,
            input_height: 256,
        }
    }
}

impl OnnxConfig {
    fn validate(&self) -> Result<()> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(ConfigError::InvalidValue {
                key: "segmentation.onnx.input_size".to_string(),
                value: format!("{}x{}", self.input_width, self.input_height)
            }.into());
        }
        Ok(())
    }
}
