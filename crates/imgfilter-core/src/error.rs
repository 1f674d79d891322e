//! Error taxonomy for the request-to-file pipeline.
//!
//! - [`ValidationError`]: client-caused, rejected before any I/O (HTTP 400).
//! - [`PipelineError`]: fetch/filter or send failed (HTTP 500).
//! - [`CleanupError`]: artifact deletion failed; logged, never returned to a client.

use std::path::PathBuf;
use thiserror::Error;

/// Rejection of the `image_url` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("The image_url query param is missing")]
    MissingParam,
    #[error("Invalid URL")]
    InvalidUrl,
}

/// Failure while downloading the remote image.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Curl reported an error (DNS, connect, timeout, TLS, aborted write).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a non-2xx status.
    #[error("GET {url} returned HTTP {code}")]
    Http { url: String, code: u32 },
    /// Body exceeded the configured `max_bytes`.
    #[error("image exceeds the {limit} byte download limit")]
    TooLarge { limit: u64 },
    /// Server answered 2xx with an empty body.
    #[error("GET {url} returned an empty body")]
    Empty { url: String },
}

/// Failure of the fetch-and-filter collaborator.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("failed to fetch image: {0}")]
    Fetch(#[from] FetchError),
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode filtered image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("artifact storage: {0}")]
    Storage(#[from] std::io::Error),
    #[error("filter task failed: {0}")]
    Task(String),
}

/// Pipeline failure; both variants map to HTTP 500 with the cause as message.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    FilterFailed(#[source] FilterError),
    #[error("failed to send filtered image: {0}")]
    SendFailed(#[source] std::io::Error),
}

/// Best-effort deletion of an artifact failed.
#[derive(Debug, Error)]
#[error("failed to delete {}: {source}", .path.display())]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
