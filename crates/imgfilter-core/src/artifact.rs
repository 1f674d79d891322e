//! Transient artifact files and their lifecycle.
//!
//! Each filtered image is written to a uniquely named `filtered.*.jpg` file in
//! the artifact directory. [`ArtifactGuard`] owns one such path and makes
//! exactly one deletion attempt when dropped, so every exit path of a request
//! (served, send failed, client gone) releases the file.

use crate::collaborator::ImageFilter;
use crate::error::CleanupError;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Filename prefix for artifacts; also used by the startup sweep.
pub const ARTIFACT_PREFIX: &str = "filtered.";
/// Filename suffix for artifacts (the filter always encodes JPEG).
pub const ARTIFACT_SUFFIX: &str = ".jpg";

/// Directory that holds transient artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Opens (creating if needed) the artifact directory.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `bytes` to a new, uniquely named artifact and returns its path.
    /// A failed write leaves nothing behind.
    pub fn persist(&self, bytes: &[u8]) -> io::Result<PathBuf> {
        let mut tmp = tempfile::Builder::new()
            .prefix(ARTIFACT_PREFIX)
            .suffix(ARTIFACT_SUFFIX)
            .tempfile_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        let (_file, path) = tmp.keep().map_err(|e| e.error)?;
        Ok(path)
    }

    /// Removes artifacts last modified more than `older_than` ago, i.e. ones
    /// left by a crashed run. Younger files may belong to a live request of
    /// another process sharing this directory and are left alone.
    /// Returns how many files were deleted.
    pub fn sweep_stale(&self, older_than: Duration) -> usize {
        let Some(cutoff) = SystemTime::now().checked_sub(older_than) else {
            return 0;
        };
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("cannot list {}: {}", self.dir.display(), e);
                return 0;
            }
        };
        let stale: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_artifact_name(path) && modified_before(path, cutoff))
            .collect();
        let failed = delete_local_files(&stale);
        stale.len() - failed.len()
    }
}

fn modified_before(path: &Path, cutoff: SystemTime) -> bool {
    std::fs::metadata(path)
        .and_then(|meta| {
            let modified = meta.modified()?;
            Ok(meta.is_file() && modified < cutoff)
        })
        .unwrap_or(false)
}

fn is_artifact_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(ARTIFACT_PREFIX) && n.ends_with(ARTIFACT_SUFFIX))
        .unwrap_or(false)
}

/// Deletes one file. A file that is already gone counts as deleted.
pub fn delete_local_file(path: &Path) -> Result<(), CleanupError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("artifact already gone: {}", path.display());
            Ok(())
        }
        Err(source) => Err(CleanupError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Best-effort removal of `paths`. Failures are logged and returned; never fatal.
pub fn delete_local_files(paths: &[PathBuf]) -> Vec<CleanupError> {
    let mut failed = Vec::new();
    for path in paths {
        match delete_local_file(path) {
            Ok(()) => tracing::debug!("deleted artifact {}", path.display()),
            Err(e) => {
                tracing::warn!("{}", e);
                failed.push(e);
            }
        }
    }
    failed
}

/// Owns one artifact path and requests its deletion exactly once, on drop.
///
/// Deletion goes through the collaborator that produced the artifact. Inside a
/// tokio runtime it runs on the blocking pool; outside one it runs inline.
pub struct ArtifactGuard {
    path: Option<PathBuf>,
    collaborator: Arc<dyn ImageFilter>,
}

impl ArtifactGuard {
    pub fn new(path: PathBuf, collaborator: Arc<dyn ImageFilter>) -> Self {
        Self {
            path: Some(path),
            collaborator,
        }
    }

    pub fn path(&self) -> &Path {
        // Only None during drop.
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

impl std::fmt::Debug for ArtifactGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactGuard")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        let collaborator = Arc::clone(&self.collaborator);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || collaborator.delete_local_files(&[path]));
            }
            Err(_) => collaborator.delete_local_files(&[path]),
        }
    }
}
