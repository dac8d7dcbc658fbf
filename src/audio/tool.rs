use std::ffi::OsString;
use std::io;
use std::process::{Command, Stdio};

use tracing::debug;

/// Result of one external tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub success: bool,
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stderr: String,
}

impl ToolOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            code: Some(0),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stderr: stderr.into(),
        }
    }

    /// Short description for error messages
    pub fn describe(&self) -> String {
        let status = match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr)
        }
    }
}

/// Runs an external program to completion
///
/// Implementations must not return before the child has been reaped.
pub trait ToolRunner: Send {
    fn run(&self, program: &str, args: &[OsString]) -> io::Result<ToolOutcome>;
}

/// [`ToolRunner`] backed by real child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessToolRunner;

impl ToolRunner for ProcessToolRunner {
    fn run(&self, program: &str, args: &[OsString]) -> io::Result<ToolOutcome> {
        debug!("Running {} {:?}", program, args);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .output()?;

        Ok(ToolOutcome {
            success: output.status.success(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(ToolOutcome::failed(1, "").describe(), "exit code 1");
        assert_eq!(
            ToolOutcome::failed(2, "  bad input\n").describe(),
            "exit code 2: bad input"
        );
        let signalled = ToolOutcome {
            success: false,
            code: None,
            stderr: String::new(),
        };
        assert_eq!(signalled.describe(), "terminated by signal");
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let result = ProcessToolRunner.run("/definitely/not/a/program", &[]);
        assert!(result.is_err());
    }
}
