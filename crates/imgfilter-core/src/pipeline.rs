//! Filter-and-serve pipeline.
//!
//! `Validated → Fetching → {Served | FetchFailed} → CleaningUp → Done`.
//! A failed fetch created no artifact and ends the request. Once an artifact
//! exists it is owned by an [`ArtifactGuard`], which travels with the open
//! file into the response stream; the guard is dropped when the stream ends,
//! errors, or is abandoned, or when opening the file fails.

use futures::Stream;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

use crate::artifact::ArtifactGuard;
use crate::collaborator::ImageFilter;
use crate::error::PipelineError;
use crate::request::ImageRequest;

const CHUNK_SIZE: usize = 64 * 1024;
const SNIFF_LEN: usize = 32;
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Turns validated requests into served artifacts.
#[derive(Clone)]
pub struct Pipeline {
    collaborator: Arc<dyn ImageFilter>,
}

impl Pipeline {
    pub fn new(collaborator: Arc<dyn ImageFilter>) -> Self {
        Self { collaborator }
    }

    /// Runs the collaborator and opens the resulting artifact for streaming.
    ///
    /// On `FilterFailed` nothing was created and nothing is deleted. On
    /// `SendFailed` the artifact's deletion has already been requested.
    pub async fn run(&self, request: ImageRequest) -> Result<ServedArtifact, PipelineError> {
        let url = request.into_url();
        tracing::info!(url = %url, "filtering image");

        let path = self
            .collaborator
            .fetch_and_filter(&url)
            .await
            .map_err(|e| {
                tracing::warn!(url = %url, "fetch/filter failed: {}", e);
                PipelineError::FilterFailed(e)
            })?;

        let guard = ArtifactGuard::new(path, Arc::clone(&self.collaborator));
        let (file, content_length, content_type) =
            open_artifact(guard.path()).await.map_err(|e| {
                tracing::warn!(artifact = %guard.path().display(), "cannot open artifact: {}", e);
                PipelineError::SendFailed(e)
            })?;

        Ok(ServedArtifact {
            content_type,
            content_length,
            file,
            guard,
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

/// An open artifact ready to be streamed; deleting it is tied to its lifetime.
#[derive(Debug)]
pub struct ServedArtifact {
    content_type: &'static str,
    content_length: u64,
    file: File,
    guard: ArtifactGuard,
}

impl ServedArtifact {
    /// MIME type sniffed from the file's leading bytes.
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn path(&self) -> &Path {
        self.guard.path()
    }

    /// Streams the file in chunks, unmodified. The artifact is released as
    /// soon as the stream reaches EOF, fails, or is dropped.
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Vec<u8>>> + Send + 'static {
        chunk_stream(self.file, self.guard)
    }
}

/// Reads `reader` to EOF in chunks, keeping `guard` alive until the stream ends.
fn chunk_stream<R>(
    reader: R,
    guard: ArtifactGuard,
) -> impl Stream<Item = io::Result<Vec<u8>>> + Send + 'static
where
    R: AsyncRead + Unpin + Send + 'static,
{
    futures::stream::try_unfold((reader, guard), |(mut reader, guard)| async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = reader.read(&mut buf).await.map_err(|e| {
            tracing::warn!(artifact = %guard.path().display(), "send failed mid-stream: {}", e);
            e
        })?;
        if n == 0 {
            tracing::debug!(artifact = %guard.path().display(), "artifact served");
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some((buf, (reader, guard))))
    })
}

async fn open_artifact(path: &Path) -> io::Result<(File, u64, &'static str)> {
    let mut file = File::open(path).await?;
    let content_length = file.metadata().await?.len();

    let mut head = [0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = file.read(&mut head[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    file.rewind().await?;

    Ok((file, content_length, sniff_content_type(&head[..filled], path)))
}

/// MIME type from magic bytes, then from the extension, else octet-stream.
fn sniff_content_type(head: &[u8], path: &Path) -> &'static str {
    image::guess_format(head)
        .or_else(|_| image::ImageFormat::from_path(path))
        .map(|format| format.to_mime_type())
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}
