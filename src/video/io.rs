use std::io;
use std::path::Path;

use crate::error::PipelineError;
use crate::video::types::{Frame, StreamProperties};

/// An opened, exclusively owned input video stream
///
/// Dropping the handle releases it; implementations must free any decoder
/// process or file handle in `Drop`.
pub trait VideoSource {
    fn properties(&self) -> &StreamProperties;

    /// Read the next frame in RGB order, or `None` at end of stream
    fn read_frame(&mut self) -> io::Result<Option<Frame>>;
}

/// An opened output video stream without audio
pub trait VideoSink {
    fn write_frame(&mut self, frame: &Frame) -> io::Result<()>;

    /// Flush and close the stream, reporting encoder failures
    ///
    /// A sink dropped without `finish` is abandoned and its output is
    /// unspecified.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// Opens video sources and sinks
pub trait VideoIo: Send {
    /// Fails with [`PipelineError::SourceUnreadable`]
    fn open_source(&self, path: &Path) -> Result<Box<dyn VideoSource>, PipelineError>;

    /// Fails with [`PipelineError::SinkUnwritable`]
    ///
    /// Implementations must verify that the sink can actually be written
    /// rather than returning a handle that fails on first use.
    fn open_sink(&self, path: &Path, properties: &StreamProperties) -> Result<Box<dyn VideoSink>, PipelineError>;
}
