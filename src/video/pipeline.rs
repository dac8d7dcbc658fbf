use std::path::Path;

use tracing::{debug, info, warn};

use crate::background::{composite, Background, PreparedBackground};
use crate::error::{ErrorKind, PipelineError, ProcessError, Result};
use crate::segmentation::MaskOracle;
use crate::video::format::ContainerFormat;
use crate::video::io::{VideoIo, VideoSink, VideoSource};
use crate::video::types::StreamProperties;

/// Lifecycle of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Unopened,
    Opened,
    Streaming,
    Closed,
    Failed(ErrorKind),
}

/// Outcome of a successful pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSummary {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    /// Properties of the input stream
    pub properties: StreamProperties,
}

/// Drives frames from a source through the oracle and compositor into a sink
///
/// A pipeline is single use: [`run`](VideoPipeline::run) consumes the
/// `Unopened` state and leaves either `Closed` or `Failed`.
pub struct VideoPipeline<'a> {
    io: &'a dyn VideoIo,
    oracle: &'a mut dyn MaskOracle,
    progress_interval: u64,
    state: PipelineState,
}

impl<'a> VideoPipeline<'a> {
    pub fn new(io: &'a dyn VideoIo, oracle: &'a mut dyn MaskOracle) -> Self {
        Self {
            io,
            oracle,
            progress_interval: 30,
            state: PipelineState::Unopened,
        }
    }

    /// Log progress every `interval` processed frames (0 disables)
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Replace the background of every frame of `input` and write the
    /// silent result to `sink_path` encoded as `format`
    ///
    /// An oracle that fails to `start` fails the run as `Setup`, before any
    /// frame is read; `finish` is only called on an oracle that started.
    pub fn run(
        &mut self,
        input: &Path,
        sink_path: &Path,
        format: ContainerFormat,
        background: Background,
    ) -> Result<PipelineSummary> {
        if self.state != PipelineState::Unopened {
            return Err(ProcessError::generic(format!(
                "pipeline already used (state {:?})",
                self.state
            )));
        }

        let result = self.run_stages(input, sink_path, format, background);
        self.state = match &result {
            Ok(_) => PipelineState::Closed,
            Err(e) => PipelineState::Failed(e.kind()),
        };
        debug!("Pipeline state: {:?}", self.state);
        result
    }

    fn transition(&mut self, state: PipelineState) {
        debug!("Pipeline state: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn run_stages(
        &mut self,
        input: &Path,
        sink_path: &Path,
        format: ContainerFormat,
        background: Background,
    ) -> Result<PipelineSummary> {
        let source = self.io.open_source(input)?;
        self.transition(PipelineState::Opened);

        let properties = source.properties().clone();
        info!(
            "Input {}: {}x{} @ {:.2} fps",
            input.display(),
            properties.width,
            properties.height,
            properties.fps
        );

        let sink_properties = StreamProperties {
            format,
            ..properties.clone()
        };
        let sink = self.io.open_sink(sink_path, &sink_properties)?;

        let prepared = background.prepare(properties.width, properties.height);

        self.oracle.start()?;
        self.transition(PipelineState::Streaming);
        let streamed = stream_frames(
            source,
            sink,
            &mut *self.oracle,
            &prepared,
            &properties,
            self.progress_interval,
        );
        self.oracle.finish();
        let (frames_processed, frames_skipped) = streamed?;

        if frames_processed == 0 {
            return Err(PipelineError::EmptyOutput {
                path: input.display().to_string(),
            }
            .into());
        }

        info!(
            "Processed {} frames ({} skipped) from {}",
            frames_processed,
            frames_skipped,
            input.display()
        );

        Ok(PipelineSummary {
            frames_processed,
            frames_skipped,
            properties,
        })
    }
}

/// The `Streaming` state: returns `(processed, skipped)`
///
/// Consumes both handles so they are released on every exit.
fn stream_frames(
    mut source: Box<dyn VideoSource>,
    mut sink: Box<dyn VideoSink>,
    oracle: &mut dyn MaskOracle,
    background: &PreparedBackground,
    properties: &StreamProperties,
    progress_interval: u64,
) -> std::result::Result<(u64, u64), PipelineError> {
    let expected = properties.dimensions();
    let mut processed = 0u64;
    let mut skipped = 0u64;
    let mut index = 0u64;

    loop {
        let frame = match source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => return Err(PipelineError::frame_io(index, format!("read failed: {}", e))),
        };

        if frame.dimensions() != expected {
            return Err(PipelineError::frame_io(
                index,
                format!(
                    "frame is {}x{}, stream is {}x{}",
                    frame.width(),
                    frame.height(),
                    expected.0,
                    expected.1
                ),
            ));
        }

        let prediction = oracle
            .predict(&frame)
            .map_err(|e| PipelineError::frame_io(index, e.to_string()))?;

        match prediction {
            Some(map) if (map.width(), map.height()) == expected => {
                let output = composite(&frame, &map.to_mask(), background);
                sink.write_frame(&output)
                    .map_err(|e| PipelineError::frame_io(index, format!("write failed: {}", e)))?;
                processed += 1;

                if progress_interval > 0 && processed % progress_interval == 0 {
                    info!("Processed {} frames", processed);
                }
            }
            Some(map) => {
                warn!(
                    "Frame {}: mask is {}x{}, expected {}x{}; skipping",
                    index,
                    map.width(),
                    map.height(),
                    expected.0,
                    expected.1
                );
                skipped += 1;
            }
            None => {
                warn!("Frame {}: no mask produced; skipping", index);
                skipped += 1;
            }
        }

        index += 1;
    }

    drop(source);
    match sink.finish() {
        Ok(()) => {}
        // An encoder with no frames may refuse to finalize; the caller reports
        // the run as empty.
        Err(e) if processed == 0 => debug!("Finalizing empty output failed: {}", e),
        Err(e) => {
            return Err(PipelineError::frame_io(
                index,
                format!("finalizing output failed: {}", e),
            ))
        }
    }

    Ok((processed, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;
    use crate::segmentation::ProbabilityMap;
    use crate::video::format;
    use crate::video::types::Frame;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded {
        frames: Vec<Frame>,
        finished: bool,
        sink_format: Option<ContainerFormat>,
    }

    struct MemoryIo {
        frames: Vec<Frame>,
        properties: StreamProperties,
        recorded: Arc<Mutex<Recorded>>,
        fail_read_at: Option<usize>,
        fail_finish: bool,
    }

    impl MemoryIo {
        fn new(count: usize, width: u32, height: u32) -> Self {
            let frames = (0..count)
                .map(|i| Frame::new_filled(width, height, [i as u8, 100, 200]))
                .collect();
            Self {
                frames,
                properties: StreamProperties {
                    width,
                    height,
                    fps: 25.0,
                    format: format::resolve("in.mp4"),
                },
                recorded: Arc::default(),
                fail_read_at: None,
                fail_finish: false,
            }
        }
    }

    struct MemorySource {
        frames: VecDeque<Frame>,
        properties: StreamProperties,
        fail_at: Option<usize>,
        read: usize,
    }

    impl VideoSource for MemorySource {
        fn properties(&self) -> &StreamProperties {
            &self.properties
        }

        fn read_frame(&mut self) -> io::Result<Option<Frame>> {
            if self.fail_at == Some(self.read) {
                return Err(io::Error::new(io::ErrorKind::Other, "corrupt packet"));
            }
            self.read += 1;
            Ok(self.frames.pop_front())
        }
    }

    struct MemorySink {
        recorded: Arc<Mutex<Recorded>>,
        fail_finish: bool,
    }

    impl VideoSink for MemorySink {
        fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
            self.recorded.lock().unwrap().frames.push(frame.clone());
            Ok(())
        }

        fn finish(self: Box<Self>) -> io::Result<()> {
            if self.fail_finish {
                return Err(io::Error::new(io::ErrorKind::Other, "encoder exited with 1"));
            }
            self.recorded.lock().unwrap().finished = true;
            Ok(())
        }
    }

    impl VideoIo for MemoryIo {
        fn open_source(&self, path: &Path) -> std::result::Result<Box<dyn VideoSource>, PipelineError> {
            if path.to_str() == Some("missing.mp4") {
                return Err(PipelineError::SourceUnreadable {
                    path: "missing.mp4".into(),
                    reason: "no such file".into(),
                });
            }
            Ok(Box::new(MemorySource {
                frames: self.frames.iter().cloned().collect(),
                properties: self.properties.clone(),
                fail_at: self.fail_read_at,
                read: 0,
            }))
        }

        fn open_sink(
            &self,
            _path: &Path,
            properties: &StreamProperties,
        ) -> std::result::Result<Box<dyn VideoSink>, PipelineError> {
            self.recorded.lock().unwrap().sink_format = Some(properties.format);
            Ok(Box::new(MemorySink {
                recorded: Arc::clone(&self.recorded),
                fail_finish: self.fail_finish,
            }))
        }
    }

    /// Keeps the top half; declines the frames listed in `absent`
    struct HalfOracle {
        absent: Vec<u64>,
        calls: u64,
        started: u32,
        finished: u32,
        fail: bool,
        fail_start: bool,
    }

    impl HalfOracle {
        fn new(absent: Vec<u64>) -> Self {
            Self {
                absent,
                calls: 0,
                started: 0,
                finished: 0,
                fail: false,
                fail_start: false,
            }
        }
    }

    impl MaskOracle for HalfOracle {
        fn name(&self) -> &str {
            "half"
        }

        fn start(&mut self) -> std::result::Result<(), OracleError> {
            if self.fail_start {
                return Err(OracleError::LoadFailed {
                    path: "model.onnx".into(),
                    reason: "not found".into(),
                });
            }
            self.started += 1;
            Ok(())
        }

        fn predict(&mut self, frame: &Frame) -> std::result::Result<Option<ProbabilityMap>, OracleError> {
            let index = self.calls;
            self.calls += 1;
            if self.fail {
                return Err(OracleError::InferenceFailed { reason: "boom".into() });
            }
            if self.absent.contains(&index) {
                return Ok(None);
            }
            let half = frame.height() / 2;
            Ok(Some(ProbabilityMap::from_fn(frame.width(), frame.height(), |_, y| {
                if y < half { 0.9 } else { 0.1 }
            })))
        }

        fn finish(&mut self) {
            self.finished += 1;
        }
    }

    fn run(io: &MemoryIo, oracle: &mut HalfOracle, input: &str) -> (Result<PipelineSummary>, PipelineState) {
        let mut pipeline = VideoPipeline::new(io, oracle);
        let result = pipeline.run(
            Path::new(input),
            Path::new("silent.avi"),
            format::resolve("out.avi"),
            Background::SolidColor([0, 255, 0]),
        );
        (result, pipeline.state())
    }

    #[test]
    fn test_successful_run_closes() {
        let io = MemoryIo::new(5, 4, 4);
        let mut oracle = HalfOracle::new(vec![]);
        let (result, state) = run(&io, &mut oracle, "in.mp4");

        let summary = result.unwrap();
        assert_eq!(summary.frames_processed, 5);
        assert_eq!(summary.frames_skipped, 0);
        assert_eq!(state, PipelineState::Closed);
        assert_eq!((oracle.started, oracle.finished), (1, 1));

        let recorded = io.recorded.lock().unwrap();
        assert!(recorded.finished);
        assert_eq!(recorded.frames.len(), 5);
        assert_eq!(recorded.frames[2].get_pixel(0, 0), [2, 100, 200]);
        assert_eq!(recorded.frames[2].get_pixel(0, 3), [0, 255, 0]);
        assert_eq!(recorded.sink_format, Some(format::resolve("out.avi")));
    }

    #[test]
    fn test_absent_masks_are_skipped() {
        let io = MemoryIo::new(6, 4, 4);
        let mut oracle = HalfOracle::new(vec![1, 4]);
        let summary = run(&io, &mut oracle, "in.mp4").0.unwrap();

        assert_eq!(summary.frames_processed, 4);
        assert_eq!(summary.frames_skipped, 2);
        assert_eq!(io.recorded.lock().unwrap().frames.len(), 4);
    }

    #[test]
    fn test_all_skipped_is_empty_output() {
        let io = MemoryIo::new(3, 4, 4);
        let mut oracle = HalfOracle::new(vec![0, 1, 2]);
        let (result, state) = run(&io, &mut oracle, "in.mp4");

        assert_eq!(result.unwrap_err().kind(), ErrorKind::EmptyOutput);
        assert_eq!(state, PipelineState::Failed(ErrorKind::EmptyOutput));
    }

    #[test]
    fn test_all_skipped_with_failing_finalize_is_empty_output() {
        let mut io = MemoryIo::new(3, 4, 4);
        io.fail_finish = true;
        let mut oracle = HalfOracle::new(vec![0, 1, 2]);
        let (result, state) = run(&io, &mut oracle, "in.mp4");

        assert_eq!(result.unwrap_err().kind(), ErrorKind::EmptyOutput);
        assert_eq!(state, PipelineState::Failed(ErrorKind::EmptyOutput));
    }

    #[test]
    fn test_failing_finalize_after_frames_is_frame_io() {
        let mut io = MemoryIo::new(3, 4, 4);
        io.fail_finish = true;
        let mut oracle = HalfOracle::new(vec![]);
        let (result, state) = run(&io, &mut oracle, "in.mp4");

        match result.unwrap_err() {
            ProcessError::Pipeline(PipelineError::FrameIo { frame, reason }) => {
                assert_eq!(frame, 3);
                assert!(reason.contains("finalizing output failed"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(state, PipelineState::Failed(ErrorKind::FrameIoError));
    }

    #[test]
    fn test_oracle_start_failure_is_setup() {
        let io = MemoryIo::new(3, 4, 4);
        let mut oracle = HalfOracle::new(vec![]);
        oracle.fail_start = true;
        let (result, state) = run(&io, &mut oracle, "in.mp4");

        assert!(matches!(result.unwrap_err(), ProcessError::Oracle(OracleError::LoadFailed { .. })));
        assert_eq!(state, PipelineState::Failed(ErrorKind::Setup));
        assert_eq!((oracle.calls, oracle.finished), (0, 0));
        let recorded = io.recorded.lock().unwrap();
        assert!(recorded.frames.is_empty() && !recorded.finished);
    }

    #[test]
    fn test_unreadable_source_never_starts_oracle() {
        let io = MemoryIo::new(3, 4, 4);
        let mut oracle = HalfOracle::new(vec![]);
        let (result, state) = run(&io, &mut oracle, "missing.mp4");

        assert_eq!(result.unwrap_err().kind(), ErrorKind::SourceUnreadable);
        assert_eq!(state, PipelineState::Failed(ErrorKind::SourceUnreadable));
        assert_eq!(oracle.started, 0);
    }

    #[test]
    fn test_read_failure_aborts_and_releases_oracle() {
        let mut io = MemoryIo::new(5, 4, 4);
        io.fail_read_at = Some(2);
        let mut oracle = HalfOracle::new(vec![]);
        let (result, state) = run(&io, &mut oracle, "in.mp4");

        match result.unwrap_err() {
            ProcessError::Pipeline(PipelineError::FrameIo { frame, .. }) => assert_eq!(frame, 2),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(state, PipelineState::Failed(ErrorKind::FrameIoError));
        assert_eq!(oracle.finished, 1);
        assert!(!io.recorded.lock().unwrap().finished);
    }

    #[test]
    fn test_oracle_failure_is_frame_io() {
        let io = MemoryIo::new(2, 4, 4);
        let mut oracle = HalfOracle::new(vec![]);
        oracle.fail = true;
        let (result, _) = run(&io, &mut oracle, "in.mp4");
        assert_eq!(result.unwrap_err().kind(), ErrorKind::FrameIoError);
        assert_eq!(oracle.finished, 1);
    }

    #[test]
    fn test_mismatched_frame_size_aborts() {
        let mut io = MemoryIo::new(3, 4, 4);
        io.frames[1] = Frame::new_black(2, 2);
        let mut oracle = HalfOracle::new(vec![]);
        let (result, _) = run(&io, &mut oracle, "in.mp4");
        assert_eq!(result.unwrap_err().kind(), ErrorKind::FrameIoError);
    }

    #[test]
    fn test_pipeline_is_single_use() {
        let io = MemoryIo::new(1, 2, 2);
        let mut oracle = HalfOracle::new(vec![]);
        let mut pipeline = VideoPipeline::new(&io, &mut oracle);
        let background = || Background::Transparent;
        let fmt = format::resolve("x.mp4");
        assert!(pipeline.run(Path::new("in.mp4"), Path::new("a.mp4"), fmt, background()).is_ok());
        assert!(pipeline.run(Path::new("in.mp4"), Path::new("a.mp4"), fmt, background()).is_err());
    }
}
