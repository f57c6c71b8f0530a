//! Subprocess spawn and bounded output capture.
//!
//! [`run_command`] takes a fully-built [`Command`] (program plus argument
//! vector), runs it with stdin closed, and collects stdout and stderr
//! concurrently. Each stream is capped; a stream that goes over the cap
//! kills the child rather than being silently truncated.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use super::executor::ScriptError;

/// Default cap on captured stdout or stderr, per stream (1 MiB).
pub const DEFAULT_MAX_CAPTURE_BYTES: usize = 1024 * 1024;

/// Captured output of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

/// Spawn `cmd`, capture at most `max_capture_bytes` of each output stream,
/// and wait for it to exit.
///
/// With `timeout` set, a process still running when it expires is killed.
/// `kill_on_drop` is set so the child also dies if this future is dropped.
pub async fn run_command(
    cmd: &mut Command,
    max_capture_bytes: usize,
    timeout: Option<Duration>,
) -> Result<ProcessOutput, ScriptError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(ScriptError::Spawn)?;

    let collected = match timeout {
        Some(limit) => {
            let outcome =
                tokio::time::timeout(limit, collect(&mut child, max_capture_bytes)).await;
            match outcome {
                Ok(collected) => collected,
                Err(_elapsed) => {
                    let _ = child.kill().await;
                    return Err(ScriptError::Timeout {
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    });
                }
            }
        }
        None => collect(&mut child, max_capture_bytes).await,
    };
    let (stdout, stderr, status) = collected?;

    Ok(ProcessOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code: status.code(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Drain both pipes, then reap the child. On overflow the child is killed.
async fn collect(
    child: &mut Child,
    limit: usize,
) -> Result<(Vec<u8>, Vec<u8>, ExitStatus), ScriptError> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let drained = tokio::try_join!(
        read_capped(stdout, limit, "stdout"),
        read_capped(stderr, limit, "stderr"),
    );

    match drained {
        Ok((out, err)) => {
            let status = child.wait().await?;
            Ok((out, err, status))
        }
        Err(e) => {
            let _ = child.kill().await;
            Err(e)
        }
    }
}

/// Read a stream to EOF, failing once more than `limit` bytes arrive.
async fn read_capped<R: AsyncRead + Unpin>(
    handle: Option<R>,
    limit: usize,
    stream: &'static str,
) -> Result<Vec<u8>, ScriptError> {
    let mut buf = Vec::new();
    if let Some(handle) = handle {
        let mut limited = handle.take(limit as u64 + 1);
        limited.read_to_end(&mut buf).await?;
    }
    if buf.len() > limit {
        return Err(ScriptError::CaptureOverflow { stream, limit });
    }
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn bash(script: &str) -> Command {
        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let output = run_command(
            &mut bash("echo out; echo err >&2; exit 7"),
            DEFAULT_MAX_CAPTURE_BYTES,
            None,
        )
        .await
        .expect("run");

        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.exit_code, Some(7));
    }

    #[tokio::test]
    async fn output_at_the_limit_is_accepted() {
        let output = run_command(&mut bash("printf '%.0s-' {1..64}"), 64, None)
            .await
            .expect("run");
        assert_eq!(output.stdout.len(), 64);
    }

    #[tokio::test]
    async fn stdout_over_the_limit_is_an_overflow() {
        let result = run_command(&mut bash("head -c 5000 /dev/zero"), 1024, None).await;
        assert_matches!(
            result,
            Err(ScriptError::CaptureOverflow { stream: "stdout", limit: 1024 })
        );
    }

    #[tokio::test]
    async fn stderr_over_the_limit_is_an_overflow() {
        let result = run_command(&mut bash("head -c 5000 /dev/zero >&2"), 1024, None).await;
        assert_matches!(
            result,
            Err(ScriptError::CaptureOverflow { stream: "stderr", .. })
        );
    }

    #[tokio::test]
    async fn timeout_kills_the_process() {
        let result = run_command(
            &mut bash("sleep 30"),
            DEFAULT_MAX_CAPTURE_BYTES,
            Some(Duration::from_millis(200)),
        )
        .await;
        assert_matches!(result, Err(ScriptError::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let mut cmd = Command::new("/nonexistent/interpreter");
        let result = run_command(&mut cmd, DEFAULT_MAX_CAPTURE_BYTES, None).await;
        assert_matches!(result, Err(ScriptError::Spawn(_)));
    }
}
