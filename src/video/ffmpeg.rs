use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::EncoderConfig;
use crate::error::PipelineError;
use crate::video::format;
use crate::video::io::{VideoIo, VideoSink, VideoSource};
use crate::video::types::{Frame, StreamProperties};

/// Frame rate assumed when the container does not report one
const FALLBACK_FPS: f64 = 30.0;

/// Video I/O through external `ffmpeg`/`ffprobe` processes
///
/// Frames travel as packed `rgb24` over the child's stdout (decoding) or
/// stdin (encoding).
#[derive(Debug, Clone, Default)]
pub struct FfmpegVideoIo {
    config: EncoderConfig,
}

impl FfmpegVideoIo {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Check that the encoder program can be executed at all
    pub fn check_available(&self) -> bool {
        Command::new(&self.config.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Read width, height and frame rate of the first video stream
    fn probe(&self, path: &Path) -> Result<(u32, u32, f64), String> {
        let output = Command::new(&self.config.probe_program)
            .args(["-v", "error", "-select_streams", "v:0"])
            .args(["-show_entries", "stream=width,height,avg_frame_rate,r_frame_rate"])
            .args(["-of", "json"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| format!("failed to run {}: {}", self.config.probe_program, e))?;

        if !output.status.success() {
            return Err(format!(
                "{} exited with {}: {}",
                self.config.probe_program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        parse_probe_output(&output.stdout)
    }

    /// Check that `name` appears in the encoder list
    fn encoder_supported(&self, name: &str) -> Result<bool, String> {
        let output = Command::new(&self.config.program)
            .args(["-hide_banner", "-v", "error", "-encoders"])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| format!("failed to run {}: {}", self.config.program, e))?;

        if !output.status.success() {
            return Err(format!("{} -encoders exited with {}", self.config.program, output.status));
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        Ok(listing
            .lines()
            .any(|line| line.split_whitespace().nth(1) == Some(name)))
    }
}

impl VideoIo for FfmpegVideoIo {
    fn open_source(&self, path: &Path) -> Result<Box<dyn VideoSource>, PipelineError> {
        let unreadable = |reason: String| PipelineError::SourceUnreadable {
            path: path.display().to_string(),
            reason,
        };

        if !path.is_file() {
            return Err(unreadable("no such file".to_string()));
        }

        let (width, height, fps) = self.probe(path).map_err(unreadable)?;
        if width == 0 || height == 0 {
            return Err(unreadable(format!("invalid frame size {}x{}", width, height)));
        }

        let mut cmd = Command::new(&self.config.program);
        cmd.args(["-v", self.config.log_level.as_str(), "-nostdin", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped());

        let mut process = ManagedChild::spawn(&mut cmd, &self.config.program)
            .map_err(|e| unreadable(format!("failed to start decoder: {}", e)))?;
        let stdout = process
            .take_stdout()
            .ok_or_else(|| unreadable("decoder stdout unavailable".to_string()))?;

        let properties = StreamProperties {
            width,
            height,
            fps,
            format: format::resolve(path),
        };
        debug!("Opened decoder for {} ({}x{} @ {:.2} fps)", path.display(), width, height, fps);

        Ok(Box::new(FfmpegSource {
            properties,
            process: Some(process),
            stdout: Some(stdout),
        }))
    }

    fn open_sink(&self, path: &Path, properties: &StreamProperties) -> Result<Box<dyn VideoSink>, PipelineError> {
        let unwritable = |reason: String| PipelineError::SinkUnwritable {
            path: path.display().to_string(),
            reason,
        };

        let codec = properties.format.codec;
        match self.encoder_supported(codec.encoder()) {
            Ok(true) => {}
            Ok(false) => {
                return Err(unwritable(format!(
                    "encoder {} for codec {} is not available",
                    codec.encoder(),
                    codec
                )))
            }
            Err(reason) => return Err(unwritable(reason)),
        }

        // The encoder only reports an unwritable path after the first frame,
        // so probe the location up front.
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| unwritable(e.to_string()))?;

        let mut cmd = Command::new(&self.config.program);
        cmd.args(["-v", self.config.log_level.as_str(), "-y"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .arg("-s")
            .arg(format!("{}x{}", properties.width, properties.height))
            .arg("-r")
            .arg(properties.fps.to_string())
            .args(["-i", "-", "-an", "-c:v", codec.encoder()]);
        if let Some(tag) = codec.stream_tag() {
            cmd.args(["-tag:v", tag]);
        }
        cmd.args(["-pix_fmt", "yuv420p"])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null());

        let mut process = ManagedChild::spawn(&mut cmd, &self.config.program)
            .map_err(|e| unwritable(format!("failed to start encoder: {}", e)))?;
        // Only catches an encoder that dies during startup (bad codec options,
        // missing libraries). A late failure surfaces from `finish`.
        if let Some(diagnostics) = process.exited_early().map_err(|e| unwritable(e.to_string()))? {
            return Err(unwritable(diagnostics));
        }
        let stdin = process
            .take_stdin()
            .ok_or_else(|| unwritable("encoder stdin unavailable".to_string()))?;

        info!(
            "Writing {}x{} @ {:.2} fps with codec {} to {}",
            properties.width, properties.height, properties.fps, codec, path.display()
        );

        Ok(Box::new(FfmpegSink {
            process: Some(process),
            stdin: Some(stdin),
        }))
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

fn parse_probe_output(json: &[u8]) -> Result<(u32, u32, f64), String> {
    let probe: ProbeOutput =
        serde_json::from_slice(json).map_err(|e| format!("invalid probe output: {}", e))?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream found".to_string())?;

    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err("video stream has no frame size".to_string());
    };

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or_else(|| {
            warn!("Stream reports no frame rate, assuming {} fps", FALLBACK_FPS);
            FALLBACK_FPS
        });

    Ok((width, height, fps))
}

/// Parse `"30000/1001"` or `"25"`; zero and undefined rates yield `None`
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

/// A child process that is killed and reaped when dropped
struct ManagedChild {
    program: String,
    child: Option<Child>,
    stderr: Option<JoinHandle<String>>,
}

impl ManagedChild {
    fn spawn(cmd: &mut Command, program: &str) -> io::Result<Self> {
        let mut child = cmd.stderr(Stdio::piped()).spawn()?;

        // Drain stderr so a chatty child never blocks on a full pipe.
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });

        Ok(Self {
            program: program.to_string(),
            child: Some(child),
            stderr,
        })
    }

    fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.as_mut().and_then(|c| c.stdout.take())
    }

    fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.as_mut().and_then(|c| c.stdin.take())
    }

    fn diagnostics(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .map(|text| text.trim().to_string())
            .unwrap_or_default()
    }

    /// If the child already exited, its exit status and diagnostics
    fn exited_early(&mut self) -> io::Result<Option<String>> {
        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };
        match child.try_wait()? {
            Some(status) => {
                self.child = None;
                let diagnostics = self.diagnostics();
                Ok(Some(format!("{} exited with {}: {}", self.program, status, diagnostics)))
            }
            None => Ok(None),
        }
    }

    /// Wait for exit and require success
    fn wait(mut self) -> io::Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        if status.success() {
            return Ok(());
        }
        let diagnostics = self.diagnostics();
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} exited with {}: {}", self.program, status, diagnostics),
        ))
    }
}

impl Drop for ManagedChild {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Decoder handle returned by [`FfmpegVideoIo::open_source`]
struct FfmpegSource {
    properties: StreamProperties,
    process: Option<ManagedChild>,
    stdout: Option<ChildStdout>,
}

impl VideoSource for FfmpegSource {
    fn properties(&self) -> &StreamProperties {
        &self.properties
    }

    fn read_frame(&mut self) -> io::Result<Option<Frame>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let len = Frame::byte_len(self.properties.width, self.properties.height);
        let mut buffer = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            match stdout.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if filled == 0 {
            // End of stream: the decoder must have exited cleanly for the
            // frames we delivered to be complete.
            self.stdout = None;
            if let Some(process) = self.process.take() {
                process.wait()?;
            }
            return Ok(None);
        }

        if filled < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("truncated frame: got {} of {} bytes", filled, len),
            ));
        }

        Frame::from_rgb_bytes(self.properties.width, self.properties.height, buffer)
            .map(Some)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "frame buffer size mismatch"))
    }
}

/// Encoder handle returned by [`FfmpegVideoIo::open_sink`]
struct FfmpegSink {
    process: Option<ManagedChild>,
    stdin: Option<ChildStdin>,
}

impl VideoSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "encoder input already closed"))?;
        stdin.write_all(frame.as_rgb_bytes())
    }

    fn finish(mut self: Box<Self>) -> io::Result<()> {
        // Closing stdin signals end of input to the encoder.
        drop(self.stdin.take());
        match self.process.take() {
            Some(process) => process.wait(),
            None => Ok(()),
        }
    }
}
