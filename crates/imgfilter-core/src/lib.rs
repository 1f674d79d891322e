//! Core of the imgfilter service: validate an image URL, fetch and filter the
//! image into a transient artifact, stream it, and clean it up.

pub mod artifact;
pub mod collaborator;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod logging;
pub mod pipeline;
pub mod request;

pub use collaborator::{CurlImageFilter, ImageFilter};
pub use error::{CleanupError, FetchError, FilterError, PipelineError, ValidationError};
pub use pipeline::{Pipeline, ServedArtifact};
pub use request::{validate_image_url, ImageRequest};
