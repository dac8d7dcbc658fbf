use std::fmt;

use thiserror::Error;

/// Main error type for the bgswap library
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Video pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Audio remux error: {0}")]
    Remux(#[from] RemuxError),

    #[error("Segmentation error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Failures of the frame-processing stage
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Could not open input video: {path} ({reason})")]
    SourceUnreadable { path: String, reason: String },

    #[error("Could not initialize video writer for {path} ({reason})")]
    SinkUnwritable { path: String, reason: String },

    #[error("Frame {frame} failed: {reason}")]
    FrameIo { frame: u64, reason: String },

    #[error("No frames were processed successfully from {path}")]
    EmptyOutput { path: String },
}

/// Failures of the audio extraction and remux stage
#[derive(Error, Debug)]
pub enum RemuxError {
    #[error("Failed to launch {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Audio extraction from {input} failed: {reason}")]
    ExtractFailed { input: String, reason: String },

    #[error("Combining video and audio into {output} failed: {reason}")]
    MuxFailed { output: String, reason: String },
}

/// Segmentation model errors
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Unknown segmentation oracle: {name}")]
    NotFound { name: String },

    #[error("Failed to load segmentation model {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Segmentation inference failed: {reason}")]
    InferenceFailed { reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using ProcessError
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Failure taxonomy exposed to front-ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SourceUnreadable,
    SinkUnwritable,
    FrameIoError,
    EmptyOutput,
    RemuxFailed,
    /// Never a run's error; only carried on [`crate::replacement::CleanupWarning`]
    TempFileCleanupWarning,
    /// Errors raised outside a run (bad configuration, model loading, ...)
    Setup,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SourceUnreadable => "SourceUnreadable",
            Self::SinkUnwritable => "SinkUnwritable",
            Self::FrameIoError => "FrameIOError",
            Self::EmptyOutput => "EmptyOutput",
            Self::RemuxFailed => "RemuxFailed",
            Self::TempFileCleanupWarning => "TempFileCleanupWarning",
            Self::Setup => "Setup",
        };
        f.write_str(name)
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceUnreadable { .. } => ErrorKind::SourceUnreadable,
            Self::SinkUnwritable { .. } => ErrorKind::SinkUnwritable,
            Self::FrameIo { .. } => ErrorKind::FrameIoError,
            Self::EmptyOutput { .. } => ErrorKind::EmptyOutput,
        }
    }

    pub(crate) fn frame_io<S: Into<String>>(frame: u64, reason: S) -> Self {
        Self::FrameIo {
            frame,
            reason: reason.into(),
        }
    }
}

impl ProcessError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Map this error onto the run failure taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Pipeline(e) => e.kind(),
            Self::Remux(_) => ErrorKind::RemuxFailed,
            Self::Oracle(_) | Self::Config(_) | Self::Io(_) | Self::Generic(_) => ErrorKind::Setup,
        }
    }

    /// Get a user-friendly error message naming the failing stage
    pub fn user_message(&self) -> String {
        match self {
            Self::Pipeline(PipelineError::SourceUnreadable { path, .. }) => {
                format!("Could not open input video '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Pipeline(PipelineError::SinkUnwritable { path, reason }) => {
                format!("Could not initialize the video writer for '{}': {}", path, reason)
            }
            Self::Pipeline(PipelineError::FrameIo { frame, reason }) => {
                format!("Frame processing stopped at frame {}: {}", frame, reason)
            }
            Self::Pipeline(PipelineError::EmptyOutput { .. }) => {
                "No frames were processed successfully; the segmentation model found nothing to keep.".to_string()
            }
            Self::Remux(e) => format!("Audio remux stage failed: {}", e),
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            Self::Oracle(OracleError::NotFound { name }) => {
                format!("Segmentation oracle '{}' not found. Available oracles: chroma-key, onnx", name)
            }
            _ => self.to_string(),
        }
    }
}
