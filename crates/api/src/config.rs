use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use docrelay_core::scripting::engine::DEFAULT_OUTPUT_EXTENSION;
use docrelay_core::scripting::subprocess::DEFAULT_MAX_CAPTURE_BYTES;
use docrelay_core::scripting::EngineConfig;

/// Default upload cap (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3001`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// Staging root for uploads and artifacts.
    pub uploads_dir: PathBuf,
    /// Directory scanned for processor scripts.
    pub scripts_dir: PathBuf,
    /// Extension a file needs to be listed as a processor.
    pub script_extension: String,
    /// Program used to run processors; `None` runs them directly.
    pub script_interpreter: Option<String>,
    /// Flag placed before the output path; `None` passes it positionally.
    pub script_output_flag: Option<String>,
    /// Extension of generated artifacts.
    pub output_extension: String,
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: usize,
    /// Per-stream cap on captured processor output.
    pub max_capture_bytes: usize,
    /// Optional kill timeout for processors.
    pub script_timeout_secs: Option<u64>,
    /// Minutes between reaper passes.
    pub cleanup_interval_mins: u64,
    /// Minutes after which a staged file is considered stale.
    pub cleanup_max_age_mins: u64,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `PORT` / `BACKEND_PORT`    | `3001`                  |
    /// | `CORS_ORIGINS`             | `http://localhost:5173` |
    /// | `UPLOADS_DIR`              | `uploads`               |
    /// | `SCRIPTS_DIR`              | `scripts`               |
    /// | `SCRIPT_EXTENSION`         | `py`                    |
    /// | `SCRIPT_INTERPRETER`       | `python3` (empty: none) |
    /// | `SCRIPT_OUTPUT_FLAG`       | `--output` (empty: none)|
    /// | `OUTPUT_EXTENSION`         | `xlsx`                  |
    /// | `MAX_UPLOAD_BYTES`         | `10485760`              |
    /// | `MAX_CAPTURE_BYTES`        | `1048576`               |
    /// | `SCRIPT_TIMEOUT_SECS`      | unset (no timeout)      |
    /// | `CLEANUP_INTERVAL_MINUTES` | `5`                     |
    /// | `CLEANUP_MAX_AGE_MINUTES`  | interval                |
    ///
    /// Panics on malformed numeric values so misconfiguration fails at
    /// startup.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port_raw = lookup("PORT")
            .or_else(|| lookup("BACKEND_PORT"))
            .unwrap_or_else(|| "3001".into());
        let port: u16 = port_raw
            .parse()
            .unwrap_or_else(|_| panic!("PORT must be a valid u16, got '{port_raw}'"));

        let cors_origins: Vec<String> = var("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let cleanup_interval_mins: u64 = parse(&lookup, "CLEANUP_INTERVAL_MINUTES", 5);
        assert!(
            cleanup_interval_mins > 0,
            "CLEANUP_INTERVAL_MINUTES must be greater than zero"
        );
        let cleanup_max_age_mins: u64 =
            parse(&lookup, "CLEANUP_MAX_AGE_MINUTES", cleanup_interval_mins);

        let script_timeout_secs = lookup("SCRIPT_TIMEOUT_SECS")
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                v.trim()
                    .parse()
                    .unwrap_or_else(|_| panic!("SCRIPT_TIMEOUT_SECS must be a valid u64"))
            });

        Self {
            host: var("HOST", "0.0.0.0"),
            port,
            cors_origins,
            uploads_dir: PathBuf::from(var("UPLOADS_DIR", "uploads")),
            scripts_dir: PathBuf::from(var("SCRIPTS_DIR", "scripts")),
            script_extension: var("SCRIPT_EXTENSION", "py"),
            script_interpreter: non_empty(var("SCRIPT_INTERPRETER", "python3")),
            script_output_flag: non_empty(var("SCRIPT_OUTPUT_FLAG", "--output")),
            output_extension: var("OUTPUT_EXTENSION", DEFAULT_OUTPUT_EXTENSION),
            max_upload_bytes: parse(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            max_capture_bytes: parse(&lookup, "MAX_CAPTURE_BYTES", DEFAULT_MAX_CAPTURE_BYTES),
            script_timeout_secs,
            cleanup_interval_mins,
            cleanup_max_age_mins,
        }
    }

    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            interpreter: self.script_interpreter.as_ref().map(PathBuf::from),
            output_extension: self.output_extension.clone(),
            output_flag: self.script_output_flag.clone(),
            max_capture_bytes: self.max_capture_bytes,
            timeout: self.script_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_mins * 60)
    }

    pub fn cleanup_max_age(&self) -> Duration {
        Duration::from_secs(self.cleanup_max_age_mins * 60)
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid number, got '{raw}'")),
        None => default,
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
