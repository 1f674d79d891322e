//! The fetch-and-filter collaborator seam and its default implementation.

use async_trait::async_trait;
use std::path::PathBuf;
use url::Url;

use crate::artifact::{self, ArtifactStore};
use crate::config::{FetchConfig, FilterConfig};
use crate::error::FilterError;
use crate::{fetch, filter};

/// Downloads an image, filters it into a local artifact, and removes artifacts.
///
/// Every successful `fetch_and_filter` call must return a path no other call
/// has returned while that file still exists.
#[async_trait]
pub trait ImageFilter: Send + Sync + 'static {
    /// Fetches `url`, applies the filter and returns the artifact path.
    async fn fetch_and_filter(&self, url: &Url) -> Result<PathBuf, FilterError>;

    /// Best-effort removal of `paths`. Failures are logged, never returned.
    /// Blocking; the pipeline calls it from the blocking pool.
    fn delete_local_files(&self, paths: &[PathBuf]) {
        artifact::delete_local_files(paths);
    }
}

/// Default collaborator: libcurl download, `image` transform, artifact on disk.
#[derive(Debug, Clone)]
pub struct CurlImageFilter {
    store: ArtifactStore,
    fetch: FetchConfig,
    filter: FilterConfig,
}

impl CurlImageFilter {
    pub fn new(store: ArtifactStore, fetch: FetchConfig, filter: FilterConfig) -> Self {
        Self {
            store,
            fetch,
            filter,
        }
    }

    /// Blocking body of `fetch_and_filter`.
    fn run_blocking(&self, url: &str) -> Result<PathBuf, FilterError> {
        let bytes = fetch::fetch_bytes(url, &self.fetch)?;
        let jpeg = filter::apply(&bytes, &self.filter)?;
        let path = self.store.persist(&jpeg)?;
        tracing::debug!(url, artifact = %path.display(), "filtered image written");
        Ok(path)
    }
}

#[async_trait]
impl ImageFilter for CurlImageFilter {
    async fn fetch_and_filter(&self, url: &Url) -> Result<PathBuf, FilterError> {
        let this = self.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || this.run_blocking(&url))
            .await
            .map_err(|e| FilterError::Task(e.to_string()))?
    }
}
