//! Subprocess execution behind a swappable runner interface.
//!
//! Everything in cauth that shells out (the keychain CLI today) goes
//! through [`CommandRunner`], so tests substitute a recorder and nothing
//! else in the system touches `std::process` directly.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::ProcessError;

/// Default command timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Command Output
// ============================================================================

/// Captured output from one subprocess invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Standard output content.
    pub stdout: String,
    /// Standard error content.
    pub stderr: String,
    /// Exit code (0 = success).
    pub exit_code: i32,
}

impl CommandOutput {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

// ============================================================================
// Runner Interface
// ============================================================================

/// API for running external binaries with captured output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, capturing stdout/stderr and exit status.
    async fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput, ProcessError>;
}

// ============================================================================
// System Runner
// ============================================================================

/// Default runner backed by `tokio::process`.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemRunner {
    /// Creates a runner with the default timeout.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Creates a runner with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Resolves a program to an executable path.
    ///
    /// Absolute and relative paths are used as-is; bare names go through
    /// `PATH` lookup.
    fn resolve(program: &Path) -> Result<PathBuf, ProcessError> {
        if program.components().count() > 1 || program.is_absolute() {
            if program.exists() {
                return Ok(program.to_path_buf());
            }
            return Err(ProcessError::NotFound(program.display().to_string()));
        }
        which::which(program).map_err(|_| {
            warn!(program = %program.display(), "Command not found");
            ProcessError::NotFound(program.display().to_string())
        })
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput, ProcessError> {
        let resolved = Self::resolve(program)?;

        // Arguments may carry secrets; only the program name is logged.
        debug!(program = %resolved.display(), arg_count = args.len(), "Running command");

        let mut command = Command::new(&resolved);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(program = %resolved.display(), timeout = ?self.timeout, "Command timed out");
                return Err(ProcessError::Timeout(self.timeout));
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code,
        };

        debug!(
            program = %resolved.display(),
            exit_code = exit_code,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "Command completed"
        );

        Ok(result)
    }
}

// ============================================================================
// Tests
// ============================================================================
