use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::{
    audio::{AudioOutcome, ProcessToolRunner, RemuxOrchestrator, ToolRunner},
    background::Background,
    config::Config,
    error::{RemuxError, Result},
    replacement::scratch::{CleanupWarning, ScratchFiles},
    segmentation::{MaskOracle, OracleRegistry},
    video::{format, ContainerFormat, FfmpegVideoIo, PipelineSummary, VideoIo, VideoPipeline},
};

/// Summary of one successful [`ReplacementEngine::process`] call
#[derive(Debug, Clone)]
pub struct RunReport {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub audio: AudioOutcome,
    /// Temporary files that outlived the run
    pub cleanup_warnings: Vec<CleanupWarning>,
    pub elapsed: Duration,
}

/// Replaces the background of whole video files
///
/// Each call to [`process`](ReplacementEngine::process) runs the same
/// sequence:
/// 1. Format Resolution - Pick codec and suffix from the output file name
/// 2. Scratch Allocation - Reserve the silent-video and audio temp files
/// 3. Frame Processing - Segment and composite every frame into the silent video
/// 4. Audio Remux - Copy the input's audio onto the silent video in a staging file
/// 5. Publish - Rename the validated staging file onto the output path
///
/// The output path is only touched once the mux has been validated. Temp
/// files are deleted on every exit path. Calls are independent; an engine
/// can process any number of files one after another.
pub struct ReplacementEngine {
    config: Config,
    io: Box<dyn VideoIo>,
    oracle: Box<dyn MaskOracle>,
    runner: Box<dyn ToolRunner>,
}

impl ReplacementEngine {
    pub fn new(
        config: Config,
        io: Box<dyn VideoIo>,
        oracle: Box<dyn MaskOracle>,
        runner: Box<dyn ToolRunner>,
    ) -> Self {
        Self {
            config,
            io,
            oracle,
            runner,
        }
    }

    /// Engine using real `ffmpeg` processes for video I/O and remuxing
    pub fn with_ffmpeg(config: Config, oracle: Box<dyn MaskOracle>) -> Self {
        let io = Box::new(FfmpegVideoIo::new(config.encoder.clone()));
        Self::new(config, io, oracle, Box::new(ProcessToolRunner))
    }

    /// Validate `config` and build the oracle it names
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let oracle = OracleRegistry::new().create(&config.segmentation.oracle, &config.segmentation)?;
        Ok(Self::with_ffmpeg(config, oracle))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    /// Replace the background of `input` and write the result to `output`
    ///
    /// Returns exactly one result; temporary artifacts are gone (or reported
    /// in the report's warnings) when this returns.
    pub fn process<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        input: P,
        output: Q,
        background: Background,
    ) -> Result<RunReport> {
        let input = input.as_ref();
        let output = output.as_ref();
        let started = Instant::now();

        info!("🎬 Replacing background");
        info!("   Input: {:?}", input);
        info!("   Output: {:?}", output);
        info!("   Oracle: {}", self.oracle.name());

        // Step 1: Format Resolution
        let format = format::resolve(output);
        debug!("Output codec {} with suffix {}", format.codec, format.suffix);

        // Step 2: Scratch Allocation
        let mut scratch = ScratchFiles::allocate(&self.config.temp, format.suffix, output)?;

        let result = self.run_stages(input, output, format, background, &mut scratch);
        let cleanup_warnings = scratch.release();
        let (summary, audio) = result?;

        let report = RunReport {
            frames_processed: summary.frames_processed,
            frames_skipped: summary.frames_skipped,
            audio,
            cleanup_warnings,
            elapsed: started.elapsed(),
        };
        info!(
            "🎉 Done in {:.1}s: {} frames written, {} skipped, output saved to {:?}",
            report.elapsed.as_secs_f64(),
            report.frames_processed,
            report.frames_skipped,
            output
        );
        Ok(report)
    }

    fn run_stages(
        &mut self,
        input: &Path,
        output: &Path,
        format: ContainerFormat,
        background: Background,
        scratch: &mut ScratchFiles,
    ) -> Result<(PipelineSummary, AudioOutcome)> {
        // Step 3: Frame Processing
        let summary = VideoPipeline::new(&*self.io, &mut *self.oracle)
            .with_progress_interval(self.config.pipeline.progress_interval)
            .run(input, scratch.silent_video(), format, background)?;

        // Step 4: Audio Remux
        debug!("Remuxing audio from {:?}", input);
        let audio = RemuxOrchestrator::new(&self.config.encoder.program, &*self.runner).remux(
            input,
            scratch.silent_video(),
            scratch.audio(),
            scratch.staged_output(),
        )?;

        // Step 5: Publish
        scratch.publish().map_err(|e| RemuxError::MuxFailed {
            output: output.display().to_string(),
            reason: format!("could not move result into place: {}", e),
        })?;

        Ok((summary, audio))
    }
}
