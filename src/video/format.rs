//! Container extension to codec lookup.

use std::fmt;
use std::path::Path;

/// Output codec, identified by its four-character code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    /// MPEG-4 Part 2 (`mp4v`)
    Mp4v,
    /// MPEG-4 Part 2 tagged for AVI players (`XVID`)
    Xvid,
    /// Windows Media Video 8 (`WMV2`)
    Wmv2,
}

impl CodecId {
    pub fn fourcc(&self) -> &'static str {
        match self {
            Self::Mp4v => "mp4v",
            Self::Xvid => "XVID",
            Self::Wmv2 => "WMV2",
        }
    }

    /// Name of the ffmpeg encoder that produces this codec
    pub fn encoder(&self) -> &'static str {
        match self {
            Self::Mp4v | Self::Xvid => "mpeg4",
            Self::Wmv2 => "wmv2",
        }
    }

    /// Codec tag to force on the output stream, if the default one is wrong
    pub fn stream_tag(&self) -> Option<&'static str> {
        match self {
            Self::Xvid => Some("XVID"),
            Self::Mp4v | Self::Wmv2 => None,
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fourcc())
    }
}

/// Resolved container format of a video file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerFormat {
    pub codec: CodecId,
    /// Suffix, including the leading dot, for temporary files of this format
    pub suffix: &'static str,
}

impl Default for ContainerFormat {
    fn default() -> Self {
        Self {
            codec: CodecId::Mp4v,
            suffix: ".mp4",
        }
    }
}

/// Extensions with a dedicated entry in the lookup table
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv"];

/// Resolve the codec and temp-file suffix for `filename`
///
/// Resolution is total: a missing or unknown extension falls back to `mp4v` in
/// an `.mp4` container.
pub fn resolve<P: AsRef<Path>>(filename: P) -> ContainerFormat {
    let extension = filename
        .as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("mp4") => ContainerFormat { codec: CodecId::Mp4v, suffix: ".mp4" },
        Some("avi") => ContainerFormat { codec: CodecId::Xvid, suffix: ".avi" },
        Some("mov") => ContainerFormat { codec: CodecId::Mp4v, suffix: ".mov" },
        Some("mkv") => ContainerFormat { codec: CodecId::Mp4v, suffix: ".mkv" },
        Some("wmv") => ContainerFormat { codec: CodecId::Wmv2, suffix: ".wmv" },
        _ => ContainerFormat::default(),
    }
}
