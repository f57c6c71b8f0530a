//! Result and error types for processor runs.

use std::path::PathBuf;

/// Detail reported when a processor leaves no output and no stderr.
pub const NO_OUTPUT_DETAIL: &str = "Output file was not generated";

/// Outcome of one processor run.
///
/// `success` is decided purely by whether the output file exists once the
/// process has finished; `exit_code` is kept for logging only.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Artifact location, present only when the file was produced.
    pub output: Option<PathBuf>,
    /// Captured stdout (lossy UTF-8).
    pub stdout: String,
    /// Captured stderr (lossy UTF-8).
    pub stderr: String,
    /// Process exit code, `None` if terminated by a signal.
    pub exit_code: Option<i32>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    pub success: bool,
}

impl ExecutionResult {
    /// The artifact path, or a [`ScriptError::NoOutput`] carrying stderr.
    pub fn into_artifact(self) -> Result<PathBuf, ScriptError> {
        match self.output {
            Some(path) if self.success => Ok(path),
            _ => {
                let stderr = self.stderr.trim();
                let detail = if stderr.is_empty() {
                    NO_OUTPUT_DETAIL.to_string()
                } else {
                    stderr.to_string()
                };
                Err(ScriptError::NoOutput { detail })
            }
        }
    }
}

/// Errors that prevent a processor run from producing an artifact.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// The staged input file is not on disk.
    #[error("Input file not found: {0}")]
    InputMissing(String),

    /// The processor file does not exist.
    #[error("Script not found: {0}")]
    NotFound(String),

    /// The processor resolves outside the scripts directory and was not run.
    #[error("Script '{0}' is outside the scripts directory")]
    OutsideRegistry(String),

    /// Direct execution was requested but the file lacks execute permission.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The process could not be started.
    #[error("Failed to start script: {0}")]
    Spawn(#[source] std::io::Error),

    /// stdout or stderr exceeded the capture limit; the process was killed.
    #[error("Script {stream} exceeded the capture limit of {limit} bytes")]
    CaptureOverflow { stream: &'static str, limit: usize },

    /// The configured timeout expired; the process was killed.
    #[error("Script timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// I/O failure while talking to the process or touching the output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The process finished without producing its output file.
    #[error("{detail}")]
    NoOutput { detail: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
