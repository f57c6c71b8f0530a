//! Directory-backed staging area for uploads and generated artifacts.
//!
//! Every uploaded input and every processor output lives directly under a
//! single root directory. Uploads are stored as `<timestamp>_<original name>`
//! where the timestamp is a per-store, strictly increasing millisecond value,
//! so concurrent requests never write to the same file. Stale entries are
//! removed by [`StagingStore::purge_older_than`], which the API crate drives
//! from a background task.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::CoreError;

/// Route prefix under which staged files are served to clients.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Characters escaped when a staged name becomes a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// A file persisted into the staging root for one execute request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// File name as supplied by the client, reduced to its last path component.
    pub original_name: String,
    /// Unique name inside the staging root (`<timestamp>_<original_name>`).
    pub storage_name: String,
    /// Number of bytes written.
    pub size: u64,
    /// MIME type reported by the client, if any.
    pub content_type: Option<String>,
    /// Absolute or root-relative location on disk.
    pub path: PathBuf,
}

/// Outcome of a single reaper pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Flat directory holding staged uploads and their artifacts.
#[derive(Debug)]
pub struct StagingStore {
    root: PathBuf,
    last_stamp: AtomicI64,
}

impl StagingStore {
    /// Open the store at `root`, creating the directory if it is missing.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| CoreError::storage(&root, e))?;
        Ok(Self {
            root,
            last_stamp: AtomicI64::new(0),
        })
    }

    /// Directory all staged files live in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Server-relative URL path under which `file_name` is retrievable.
    ///
    /// The name is percent-encoded as one path segment; the static file
    /// route decodes it back to the on-disk name.
    pub fn public_path(file_name: &str) -> String {
        format!(
            "{PUBLIC_PREFIX}/{}",
            utf8_percent_encode(file_name, PATH_SEGMENT)
        )
    }

    /// Persist `content` under a fresh unique name.
    ///
    /// The bytes are written to a hidden `.part` file, synced, and renamed
    /// into place, so the final name only ever refers to a complete file.
    pub async fn store(
        &self,
        content: &[u8],
        original_name: &str,
        content_type: Option<&str>,
    ) -> Result<UploadedFile, CoreError> {
        let original_name = sanitize_file_name(original_name)?;
        let storage_name = format!("{}_{original_name}", self.next_stamp());
        let path = self.root.join(&storage_name);
        let part = self.root.join(format!(".{storage_name}.part"));

        if let Err(e) = write_synced(&part, content).await {
            let _ = fs::remove_file(&part).await;
            return Err(CoreError::storage(&part, e));
        }
        if let Err(e) = fs::rename(&part, &path).await {
            let _ = fs::remove_file(&part).await;
            return Err(CoreError::storage(&path, e));
        }

        tracing::info!(
            original_name = %original_name,
            storage_name = %storage_name,
            mime = content_type.unwrap_or("application/octet-stream"),
            size = content.len(),
            "Staged upload"
        );

        Ok(UploadedFile {
            original_name,
            storage_name,
            size: content.len() as u64,
            content_type: content_type.map(str::to_owned),
            path,
        })
    }

    /// Delete every regular file whose modification time is more than
    /// `max_age` in the past.
    ///
    /// Failures on individual entries are logged and counted; they never
    /// stop the scan. An unreadable root yields an empty report.
    pub async fn purge_older_than(&self, max_age: Duration) -> PurgeReport {
        let mut report = PurgeReport::default();

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(root = %self.root.display(), error = %e, "Cannot read staging root");
                return report;
            }
        };

        let now = SystemTime::now();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read staging entry");
                    report.failed += 1;
                    continue;
                }
            };
            report.scanned += 1;
            let path = entry.path();

            let modified = match entry.metadata().await {
                Ok(meta) if meta.is_dir() => continue,
                Ok(meta) => meta.modified(),
                Err(e) => Err(e),
            };
            let modified = match modified {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to stat staged file");
                    report.failed += 1;
                    continue;
                }
            };

            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => {
                    report.deleted += 1;
                    tracing::info!(
                        file = %entry.file_name().to_string_lossy(),
                        age_secs = age.as_secs(),
                        "Deleted old file"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(path = %path.display(), error = %e, "Failed to delete staged file");
                }
            }
        }

        report
    }

    /// Next timestamp prefix: wall-clock milliseconds, bumped past the
    /// previous value when two requests land in the same millisecond.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self.last_stamp.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// Browsers on Windows may send `C:\fakepath\name.pdf`, so both separators
/// are honoured.
pub fn sanitize_file_name(name: &str) -> Result<String, CoreError> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base == "." || base == ".." || base.contains('\0') {
        return Err(CoreError::Validation(format!(
            "Invalid file name '{name}'"
        )));
    }
    Ok(base.to_string())
}

async fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(content).await?;
    file.flush().await?;
    file.sync_all().await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
