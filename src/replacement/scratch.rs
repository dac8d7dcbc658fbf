use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};
use tracing::{debug, warn};

use crate::config::TempConfig;
use crate::error::ErrorKind;

/// A temporary artifact that could not be deleted
///
/// Reported alongside a run's result, never as its error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    pub path: PathBuf,
    pub reason: String,
}

impl CleanupWarning {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::TempFileCleanupWarning
    }
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to remove temporary file {}: {}", self.path.display(), self.reason)
    }
}

/// The temporary files owned by one run
///
/// Paths are unique per run, so independent runs never collide. Dropping
/// without [`release`](ScratchFiles::release) still deletes the files but
/// swallows failures.
pub struct ScratchFiles {
    silent_video: TempPath,
    audio: TempPath,
    /// Muxed result, next to the final output until it is published
    staged_output: Option<TempPath>,
    staged_path: PathBuf,
    output: PathBuf,
}

impl ScratchFiles {
    /// Create the silent-video file (with `video_suffix`), the audio file and
    /// a staging file beside `output`
    pub fn allocate(config: &TempConfig, video_suffix: &str, output: &Path) -> io::Result<Self> {
        let silent_video = create(config, video_suffix)?;
        let audio = create(config, ".aac")?;
        let staged_output = stage_beside(config, output)?;
        debug!(
            "Allocated temporary files {}, {} and {}",
            silent_video.display(),
            audio.display(),
            staged_output.display()
        );
        Ok(Self {
            silent_video,
            audio,
            staged_path: staged_output.to_path_buf(),
            staged_output: Some(staged_output),
            output: output.to_path_buf(),
        })
    }

    pub fn silent_video(&self) -> &Path {
        &self.silent_video
    }

    pub fn audio(&self) -> &Path {
        &self.audio
    }

    /// Where the mux writes; becomes the output on [`publish`](ScratchFiles::publish)
    pub fn staged_output(&self) -> &Path {
        &self.staged_path
    }

    /// Move the staged result onto the output path
    ///
    /// On failure the staged file stays owned and is removed by `release`.
    pub fn publish(&mut self) -> io::Result<()> {
        let staged = self.staged_output.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "output already published")
        })?;
        match staged.persist(&self.output) {
            Ok(()) => {
                debug!("Published {}", self.output.display());
                Ok(())
            }
            Err(e) => {
                self.staged_output = Some(e.path);
                Err(e.error)
            }
        }
    }

    /// Delete every artifact, collecting the ones that could not be removed
    pub fn release(self) -> Vec<CleanupWarning> {
        [Some(self.silent_video), Some(self.audio), self.staged_output]
            .into_iter()
            .flatten()
            .filter_map(|temp| {
                let path = temp.to_path_buf();
                match temp.close() {
                    Ok(()) => None,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                    Err(e) => {
                        let warning = CleanupWarning {
                            path,
                            reason: e.to_string(),
                        };
                        warn!("{}", warning);
                        Some(warning)
                    }
                }
            })
            .collect()
    }
}

/// Staging file in the output's directory, so publishing is a rename
fn stage_beside(config: &TempConfig, output: &Path) -> io::Result<TempPath> {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let suffix = output
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let file = Builder::new()
        .prefix(&config.prefix)
        .suffix(&suffix)
        .tempfile_in(dir)?;
    Ok(file.into_temp_path())
}

fn create(config: &TempConfig, suffix: &str) -> io::Result<TempPath> {
    let mut builder = Builder::new();
    builder.prefix(&config.prefix).suffix(suffix);
    let file = match &config.directory {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    Ok(file.into_temp_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> TempConfig {
        TempConfig {
            directory: Some(dir.to_path_buf()),
            prefix: "scratch-".to_string(),
        }
    }

    #[test]
    fn test_allocate_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let scratch = ScratchFiles::allocate(&config_in(dir.path()), ".avi", &out.path().join("x.avi")).unwrap();

        let video = scratch.silent_video().to_path_buf();
        let audio = scratch.audio().to_path_buf();
        assert!(video.exists() && audio.exists());
        assert_ne!(video, audio);
        assert!(video.to_string_lossy().ends_with(".avi"));
        assert!(audio.to_string_lossy().ends_with(".aac"));
        assert!(video.file_name().unwrap().to_string_lossy().starts_with("scratch-"));

        let staged = scratch.staged_output().to_path_buf();
        assert_eq!(staged.parent(), Some(out.path()));
        assert!(staged.to_string_lossy().ends_with(".avi"));

        assert!(scratch.release().is_empty());
        assert!(!video.exists() && !audio.exists() && !staged.exists());
        assert!(!out.path().join("x.avi").exists());
    }

    #[test]
    fn test_publish_moves_staged_file_onto_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("result.mp4");
        std::fs::write(&output, b"stale").unwrap();

        let mut scratch = ScratchFiles::allocate(&config_in(dir.path()), ".mp4", &output).unwrap();
        std::fs::write(scratch.staged_output(), b"muxed").unwrap();
        let staged = scratch.staged_output().to_path_buf();

        scratch.publish().unwrap();
        assert!(scratch.release().is_empty());
        assert_eq!(std::fs::read(&output).unwrap(), b"muxed");
        assert!(!staged.exists());
    }

    #[test]
    fn test_publish_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut scratch = ScratchFiles::allocate(&config_in(dir.path()), ".mp4", &dir.path().join("o.mp4")).unwrap();
        scratch.publish().unwrap();
        assert!(scratch.publish().is_err());
        assert!(scratch.release().is_empty());
    }

    #[test]
    fn test_unpublished_output_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("result.mp4");
        let scratch = ScratchFiles::allocate(&config_in(dir.path()), ".mp4", &output).unwrap();
        std::fs::write(scratch.staged_output(), b"partial").unwrap();

        assert!(scratch.release().is_empty());
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_undeletable_artifact_becomes_warning() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchFiles::allocate(&config_in(dir.path()), ".mp4", &dir.path().join("o.mp4")).unwrap();

        // A non-empty directory where the audio file was cannot be removed as a file.
        let audio = scratch.audio().to_path_buf();
        std::fs::remove_file(&audio).unwrap();
        std::fs::create_dir(&audio).unwrap();
        std::fs::write(audio.join("keep"), b"x").unwrap();

        let warnings = scratch.release();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind(), ErrorKind::TempFileCleanupWarning);
        assert_eq!(warnings[0].path, audio);
    }

    #[test]
    fn test_already_removed_is_not_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchFiles::allocate(&config_in(dir.path()), ".mp4", &dir.path().join("o.mp4")).unwrap();
        std::fs::remove_file(scratch.audio()).unwrap();
        assert!(scratch.release().is_empty());
    }

    #[test]
    fn test_runs_get_disjoint_paths() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let output = dir.path().join("o.mp4");
        let a = ScratchFiles::allocate(&config, ".mp4", &output).unwrap();
        let b = ScratchFiles::allocate(&config, ".mp4", &output).unwrap();
        assert_ne!(a.silent_video(), b.silent_video());
        assert_ne!(a.audio(), b.audio());
        assert_ne!(a.staged_output(), b.staged_output());
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir.path().join("absent"));
        assert!(ScratchFiles::allocate(&config, ".mp4", &dir.path().join("o.mp4")).is_err());
    }

    #[test]
    fn test_warning_kind() {
        let warning = CleanupWarning {
            path: PathBuf::from("/tmp/x.mp4"),
            reason: "busy".to_string(),
        };
        assert_eq!(warning.kind(), ErrorKind::TempFileCleanupWarning);
        assert!(warning.to_string().contains("/tmp/x.mp4"));
    }
}
