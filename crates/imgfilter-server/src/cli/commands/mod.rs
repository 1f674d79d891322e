//! CLI command handlers, one per file.

mod filter;
mod serve;

pub use filter::run_filter;
pub use serve::run_serve;

use anyhow::{Context, Result};
use imgfilter_core::artifact::ArtifactStore;
use imgfilter_core::config::ServerConfig;
use imgfilter_core::{CurlImageFilter, Pipeline};
use std::sync::Arc;

/// Builds the default curl-backed pipeline over the configured artifact directory.
fn build_pipeline(cfg: &ServerConfig) -> Result<(Pipeline, ArtifactStore)> {
    let dir = cfg.artifact_dir();
    let store = ArtifactStore::open(&dir)
        .with_context(|| format!("cannot create artifact dir {}", dir.display()))?;
    let collaborator = CurlImageFilter::new(store.clone(), cfg.fetch.clone(), cfg.filter);
    Ok((Pipeline::new(Arc::new(collaborator)), store))
}
