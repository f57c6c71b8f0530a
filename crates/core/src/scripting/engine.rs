//! Execution engine: run a processor against a staged input and judge the
//! result by whether the output file appeared.
//!
//! Processors are invoked as
//! `[interpreter] <script> <input> [<output flag>] <output>`, built as an
//! argument vector. File names containing whitespace or shell
//! metacharacters reach the processor as single, unmodified arguments.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use super::executor::{ExecutionResult, ScriptError};
use super::subprocess::{self, DEFAULT_MAX_CAPTURE_BYTES};
use crate::registry::{Processor, ScriptRegistry};

/// Default extension for generated artifacts.
pub const DEFAULT_OUTPUT_EXTENSION: &str = "xlsx";

/// How processors are launched and how their output is captured.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Program that runs the script (`python3` by default). `None` executes
    /// the script file directly, which then needs its execute bit.
    pub interpreter: Option<PathBuf>,
    /// Extension given to the artifact, without the leading dot.
    pub output_extension: String,
    /// Flag placed before the output path; `None` passes it positionally.
    pub output_flag: Option<String>,
    /// Per-stream cap on captured stdout/stderr.
    pub max_capture_bytes: usize,
    /// Kill the processor after this long. No limit when `None`.
    pub timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interpreter: Some(PathBuf::from("python3")),
            output_extension: DEFAULT_OUTPUT_EXTENSION.to_string(),
            output_flag: Some("--output".to_string()),
            max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
            timeout: None,
        }
    }
}

/// Runs processors from a single [`ScriptRegistry`].
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    config: EngineConfig,
    registry: ScriptRegistry,
}

impl ExecutionEngine {
    pub fn new(config: EngineConfig, registry: ScriptRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Where the artifact for `input` will be written.
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        derive_output_path(input, &self.config.output_extension)
    }

    /// Run `processor` against the staged file at `input`.
    ///
    /// Returns `Ok` whenever the process ran to completion, successful or
    /// not; check [`ExecutionResult::success`] or call
    /// [`ExecutionResult::into_artifact`]. `Err` means the run could not be
    /// carried out at all.
    pub async fn run(
        &self,
        input: &Path,
        processor: &Processor,
    ) -> Result<ExecutionResult, ScriptError> {
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(ScriptError::InputMissing(input.display().to_string()));
        }

        let script = tokio::fs::canonicalize(&processor.path)
            .await
            .map_err(|_| ScriptError::NotFound(processor.id.clone()))?;
        if !self.registry.contains(&script) {
            tracing::error!(
                script = %processor.id,
                path = %script.display(),
                "Refusing to run script outside the scripts directory"
            );
            return Err(ScriptError::OutsideRegistry(processor.id.clone()));
        }

        let output = self.output_path_for(input);
        match tokio::fs::remove_file(&output).await {
            Ok(()) => tracing::debug!(output = %output.display(), "Removed stale artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ScriptError::Io(e)),
        }

        let mut cmd = self.build_command(&script, input, &output).await?;
        tracing::info!(
            script = %processor.id,
            input = %input.display(),
            output = %output.display(),
            "Running script"
        );

        let process =
            subprocess::run_command(&mut cmd, self.config.max_capture_bytes, self.config.timeout)
                .await?;

        if !process.stdout.is_empty() {
            tracing::debug!(script = %processor.id, stdout = %process.stdout, "Script stdout");
        }
        if !process.stderr.is_empty() {
            tracing::debug!(script = %processor.id, stderr = %process.stderr, "Script stderr");
        }

        let produced = tokio::fs::try_exists(&output).await.unwrap_or(false);
        if produced {
            if process.exit_code != Some(0) {
                tracing::warn!(
                    script = %processor.id,
                    exit_code = ?process.exit_code,
                    "Script exited abnormally but produced output"
                );
            }
            tracing::info!(
                output = %output.display(),
                duration_ms = process.duration_ms,
                "Output file created"
            );
        } else {
            tracing::warn!(
                script = %processor.id,
                exit_code = ?process.exit_code,
                duration_ms = process.duration_ms,
                "Script finished without producing output"
            );
        }

        Ok(ExecutionResult {
            output: produced.then_some(output),
            stdout: process.stdout,
            stderr: process.stderr,
            exit_code: process.exit_code,
            duration_ms: process.duration_ms,
            success: produced,
        })
    }

    async fn build_command(
        &self,
        script: &Path,
        input: &Path,
        output: &Path,
    ) -> Result<Command, ScriptError> {
        let mut cmd = match &self.config.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(script);
                cmd
            }
            None => {
                ensure_executable(script).await?;
                Command::new(script)
            }
        };

        cmd.arg(input);
        if let Some(flag) = &self.config.output_flag {
            cmd.arg(flag);
        }
        cmd.arg(output);
        Ok(cmd)
    }
}

#[cfg(unix)]
async fn ensure_executable(script: &Path) -> Result<(), ScriptError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = tokio::fs::metadata(script).await?.permissions().mode();
    if mode & 0o111 == 0 {
        return Err(ScriptError::PermissionDenied(format!(
            "{} is not executable (mode {mode:#o})",
            script.display()
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
async fn ensure_executable(_script: &Path) -> Result<(), ScriptError> {
    Ok(())
}

/// Derive the artifact path for `input`.
///
/// The trailing extension is replaced with `extension`; an input without an
/// extension gets `extension` appended. If that would name the input itself
/// (the upload already carries the output extension), `.out` is inserted
/// before the extension so the input is never overwritten.
pub fn derive_output_path(input: &Path, extension: &str) -> PathBuf {
    let extension = extension.trim_start_matches('.');

    let output = if input.extension().is_some() {
        input.with_extension(extension)
    } else {
        let mut appended = input.as_os_str().to_owned();
        appended.push(".");
        appended.push(extension);
        PathBuf::from(appended)
    };

    if output != input {
        return output;
    }
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}.out.{extension}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
