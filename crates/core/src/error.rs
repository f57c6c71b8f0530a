/// Domain-level errors shared by the staging store and the script registry.
///
/// Execution failures have their own type,
/// [`ScriptError`](crate::scripting::executor::ScriptError), because they
/// carry captured process diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} '{id}'")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Registry error: {0}")]
    Registry(String),
}

impl CoreError {
    /// Wrap an I/O failure on `path` as a [`CoreError::Storage`].
    pub fn storage(path: &std::path::Path, err: std::io::Error) -> Self {
        Self::Storage(format!("{}: {err}", path.display()))
    }
}
