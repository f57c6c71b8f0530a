//! Discovery of processor scripts.
//!
//! Processors are plain files in a single directory whose names carry the
//! configured extension (`py` by default). Identifiers handed in by clients
//! are treated as opaque file names, never as paths.

use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// A processor script discovered in the registry directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processor {
    /// File name, as listed by [`ScriptRegistry::list`].
    pub id: String,
    /// Canonical location of the script.
    pub path: PathBuf,
}

/// Read-only view over the processor directory.
#[derive(Debug, Clone)]
pub struct ScriptRegistry {
    dir: PathBuf,
    extension: String,
}

impl ScriptRegistry {
    /// Open the registry at `dir`.
    ///
    /// The directory must exist and be readable; callers treat failure as
    /// fatal at startup.
    pub fn open(dir: impl AsRef<Path>, extension: &str) -> Result<Self, CoreError> {
        let dir = dir.as_ref();
        let canonical = dir
            .canonicalize()
            .map_err(|e| CoreError::Registry(format!("{}: {e}", dir.display())))?;
        std::fs::read_dir(&canonical)
            .map_err(|e| CoreError::Registry(format!("{}: {e}", canonical.display())))?;

        Ok(Self {
            dir: canonical,
            extension: extension.trim_start_matches('.').to_string(),
        })
    }

    /// Canonical processor directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of all processors, sorted.
    ///
    /// Entries that cannot be inspected are skipped; only an unreadable
    /// directory is an error.
    pub async fn list(&self) -> Result<Vec<String>, CoreError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| CoreError::Registry(format!("{}: {e}", self.dir.display())))?;

        let suffix = format!(".{}", self.extension);
        let mut scripts = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable script entry");
                    continue;
                }
            };
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.ends_with(&suffix) {
                continue;
            }
            match tokio::fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_file() => scripts.push(name),
                Ok(_) => {}
                Err(e) => tracing::debug!(script = %name, error = %e, "Skipping script entry"),
            }
        }

        scripts.sort();
        tracing::debug!(count = scripts.len(), "Scripts found");
        Ok(scripts)
    }

    /// Resolve a client-supplied identifier to a processor location.
    pub async fn resolve(&self, id: &str) -> Result<Processor, CoreError> {
        validate_identifier(id)?;

        let candidate = self.dir.join(id);
        let meta = match tokio::fs::metadata(&candidate).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(not_found(id));
            }
            Err(e) => return Err(CoreError::Registry(format!("{id}: {e}"))),
        };
        if !meta.is_file() {
            return Err(not_found(id));
        }

        let path = tokio::fs::canonicalize(&candidate)
            .await
            .map_err(|e| CoreError::Registry(format!("{id}: {e}")))?;
        if !self.contains(&path) {
            return Err(CoreError::Validation(format!(
                "Script '{id}' resolves outside the scripts directory"
            )));
        }

        Ok(Processor {
            id: id.to_string(),
            path,
        })
    }

    /// Whether the canonical `path` lies inside the processor directory.
    pub fn contains(&self, path: &Path) -> bool {
        path.parent() == Some(self.dir.as_path())
    }
}

fn not_found(id: &str) -> CoreError {
    CoreError::NotFound {
        entity: "Script",
        id: id.to_string(),
    }
}

/// Reject anything that is not a bare file name.
fn validate_identifier(id: &str) -> Result<(), CoreError> {
    let invalid = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\', '\0'])
        || Path::new(id).is_absolute();

    if invalid {
        return Err(CoreError::Validation(format!(
            "Invalid script identifier '{id}'"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
