//! `imgfilter filter <url> <output>` – run the pipeline once, write to a file.

use anyhow::{Context, Result};
use futures::TryStreamExt;
use imgfilter_core::config::ServerConfig;
use imgfilter_core::validate_image_url;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use super::build_pipeline;

pub async fn run_filter(cfg: &ServerConfig, url: &str, output: &Path) -> Result<()> {
    let request = validate_image_url(Some(url))?;
    let (pipeline, _store) = build_pipeline(cfg)?;
    let served = pipeline.run(request).await?;

    let mut out = tokio::fs::File::create(output)
        .await
        .with_context(|| format!("create {}", output.display()))?;
    let mut stream = Box::pin(served.into_stream());
    let mut written = 0u64;
    while let Some(chunk) = stream.try_next().await.context("read artifact")? {
        out.write_all(&chunk)
            .await
            .with_context(|| format!("write {}", output.display()))?;
        written += chunk.len() as u64;
    }
    out.flush().await?;

    println!("{}  {} bytes", output.display(), written);
    Ok(())
}
