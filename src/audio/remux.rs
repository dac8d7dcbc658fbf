use std::ffi::OsString;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::audio::tool::{ToolOutcome, ToolRunner};
use crate::error::RemuxError;

/// How the final output received its audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioOutcome {
    /// The input's audio track was copied into the output
    Remuxed,
    /// The input had no audio; the output is the processed video alone
    VideoOnly,
}

/// Moves the input's audio track onto the processed silent video
///
/// Two encoder invocations: extract the audio to a side file, then stream-copy
/// video and audio into the final container.
pub struct RemuxOrchestrator<'a> {
    program: &'a str,
    runner: &'a dyn ToolRunner,
}

impl<'a> RemuxOrchestrator<'a> {
    pub fn new(program: &'a str, runner: &'a dyn ToolRunner) -> Self {
        Self { program, runner }
    }

    /// Extract, then mux
    pub fn remux(
        &self,
        input: &Path,
        silent_video: &Path,
        audio_path: &Path,
        output: &Path,
    ) -> Result<AudioOutcome, RemuxError> {
        if self.extract_audio(input, audio_path)? {
            self.mux(silent_video, Some(audio_path), output)?;
            Ok(AudioOutcome::Remuxed)
        } else {
            info!("{} has no audio track; writing video only", input.display());
            self.mux(silent_video, None, output)?;
            Ok(AudioOutcome::VideoOnly)
        }
    }

    /// Extract the audio track of `input` into `audio_path`
    ///
    /// Returns whether an audio artifact was produced. An input without audio
    /// leaves an empty or absent file, which is not an error.
    pub fn extract_audio(&self, input: &Path, audio_path: &Path) -> Result<bool, RemuxError> {
        let args: Vec<OsString> = vec![
            "-i".into(),
            input.into(),
            "-q:a".into(),
            "0".into(),
            "-map".into(),
            "a".into(),
            audio_path.into(),
            "-y".into(),
        ];
        let outcome = self.invoke(&args)?;
        let produced = has_content(audio_path);

        match (outcome.success, produced) {
            (_, false) => {
                if !outcome.success {
                    debug!("Audio extraction produced nothing ({})", outcome.describe());
                }
                Ok(false)
            }
            (true, true) => Ok(true),
            (false, true) => Err(RemuxError::ExtractFailed {
                input: input.display().to_string(),
                reason: outcome.describe(),
            }),
        }
    }

    /// Stream-copy `silent_video` and, when given, `audio` into `output`
    ///
    /// Succeeds only if the encoder exits cleanly and `output` is non-empty.
    pub fn mux(&self, silent_video: &Path, audio: Option<&Path>, output: &Path) -> Result<(), RemuxError> {
        let mut args: Vec<OsString> = vec!["-i".into(), silent_video.into()];
        if let Some(audio) = audio {
            args.extend(["-i".into(), audio.into()]);
        }
        args.extend(["-c".into(), "copy".into(), "-map".into(), "0:v:0".into()]);
        if audio.is_some() {
            args.extend(["-map".into(), "1:a:0".into()]);
        }
        args.extend([output.into(), "-y".into()]);

        let outcome = self.invoke(&args)?;
        let mux_failed = |reason: String| RemuxError::MuxFailed {
            output: output.display().to_string(),
            reason,
        };

        if !outcome.success {
            return Err(mux_failed(outcome.describe()));
        }
        if !has_content(output) {
            warn!("{} exited cleanly but {} is missing or empty", self.program, output.display());
            return Err(mux_failed("output file missing or empty".to_string()));
        }

        debug!("Muxed {}", output.display());
        Ok(())
    }

    fn invoke(&self, args: &[OsString]) -> Result<ToolOutcome, RemuxError> {
        self.runner
            .run(self.program, args)
            .map_err(|e| RemuxError::Spawn {
                program: self.program.to_string(),
                reason: e.to_string(),
            })
    }
}

fn has_content(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Writes `bytes` to the last argument before `-y` and reports `outcome`
    struct ScriptedRunner {
        steps: Mutex<Vec<(ToolOutcome, &'static [u8])>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        fn new(steps: Vec<(ToolOutcome, &'static [u8])>) -> Self {
            Self {
                steps: Mutex::new(steps.into_iter().rev().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ToolRunner for ScriptedRunner {
        fn run(&self, _program: &str, args: &[OsString]) -> io::Result<ToolOutcome> {
            let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
            self.calls.lock().unwrap().push(args.clone());

            let (outcome, bytes) = self
                .steps
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no more steps"))?;
            let target = PathBuf::from(&args[args.len() - 2]);
            if !bytes.is_empty() {
                fs::write(target, bytes)?;
            }
            Ok(outcome)
        }
    }

    fn paths(dir: &Path) -> (PathBuf, PathBuf, PathBuf, PathBuf) {
        let input = dir.join("in.mp4");
        let silent = dir.join("silent.mp4");
        fs::write(&input, b"input").unwrap();
        fs::write(&silent, b"video").unwrap();
        (input, silent, dir.join("audio.aac"), dir.join("out.mp4"))
    }

    #[test]
    fn test_remux_with_audio() {
        let dir = tempfile::tempdir().unwrap();
        let (input, silent, audio, output) = paths(dir.path());
        let runner = ScriptedRunner::new(vec![
            (ToolOutcome::succeeded(), b"aac"),
            (ToolOutcome::succeeded(), b"muxed"),
        ]);

        let orchestrator = RemuxOrchestrator::new("ffmpeg", &runner);
        let outcome = orchestrator.remux(&input, &silent, &audio, &output).unwrap();
        assert_eq!(outcome, AudioOutcome::Remuxed);

        let calls = runner.calls();
        assert_eq!(
            calls[0],
            vec!["-i", input.to_str().unwrap(), "-q:a", "0", "-map", "a", audio.to_str().unwrap(), "-y"]
        );
        assert_eq!(
            calls[1],
            vec![
                "-i", silent.to_str().unwrap(),
                "-i", audio.to_str().unwrap(),
                "-c", "copy", "-map", "0:v:0", "-map", "1:a:0",
                output.to_str().unwrap(), "-y",
            ]
        );
    }

    #[test]
    fn test_no_audio_muxes_video_only() {
        let dir = tempfile::tempdir().unwrap();
        let (input, silent, audio, output) = paths(dir.path());
        let runner = ScriptedRunner::new(vec![
            (ToolOutcome::failed(1, "Stream map 'a' matches no streams"), b""),
            (ToolOutcome::succeeded(), b"muxed"),
        ]);

        let orchestrator = RemuxOrchestrator::new("ffmpeg", &runner);
        let outcome = orchestrator.remux(&input, &silent, &audio, &output).unwrap();
        assert_eq!(outcome, AudioOutcome::VideoOnly);
        assert_eq!(
            runner.calls()[1],
            vec!["-i", silent.to_str().unwrap(), "-c", "copy", "-map", "0:v:0", output.to_str().unwrap(), "-y"]
        );
    }

    #[test]
    fn test_failed_extraction_with_artifact_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let (input, _, audio, _) = paths(dir.path());
        let runner = ScriptedRunner::new(vec![(ToolOutcome::failed(1, "decode error"), b"partial")]);

        let err = RemuxOrchestrator::new("ffmpeg", &runner)
            .extract_audio(&input, &audio)
            .unwrap_err();
        assert!(matches!(err, RemuxError::ExtractFailed { .. }));
    }

    #[test]
    fn test_mux_exit_code_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let (_, silent, _, output) = paths(dir.path());
        let runner = ScriptedRunner::new(vec![(ToolOutcome::failed(1, "muxer error"), b"junk")]);

        let err = RemuxOrchestrator::new("ffmpeg", &runner)
            .mux(&silent, None, &output)
            .unwrap_err();
        match err {
            RemuxError::MuxFailed { reason, .. } => assert!(reason.contains("muxer error")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mux_requires_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let (_, silent, _, output) = paths(dir.path());
        let runner = ScriptedRunner::new(vec![(ToolOutcome::succeeded(), b"")]);

        let err = RemuxOrchestrator::new("ffmpeg", &runner)
            .mux(&silent, None, &output)
            .unwrap_err();
        assert!(matches!(err, RemuxError::MuxFailed { .. }));
    }

    #[test]
    fn test_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (input, _, audio, _) = paths(dir.path());
        let runner = ScriptedRunner::new(vec![]);

        let err = RemuxOrchestrator::new("ffmpeg", &runner)
            .extract_audio(&input, &audio)
            .unwrap_err();
        assert!(matches!(err, RemuxError::Spawn { .. }));
    }
}
