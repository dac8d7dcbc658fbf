//! # Video Processing Module
//!
//! Frame types, container format resolution, the source/sink seam and the
//! pipeline that drives frames through segmentation and compositing.

pub mod ffmpeg;
pub mod format;
pub mod io;
pub mod pipeline;
pub mod types;

pub use ffmpeg::FfmpegVideoIo;
pub use format::{resolve, CodecId, ContainerFormat, SUPPORTED_EXTENSIONS};
pub use io::{VideoIo, VideoSink, VideoSource};
pub use pipeline::{PipelineState, PipelineSummary, VideoPipeline};
pub use types::{Frame, StreamProperties};
