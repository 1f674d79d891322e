//! Request validation for `GET /filteredimage`.
//!
//! A purely syntactic check on the `image_url` query parameter: no DNS lookup,
//! no connection. Anything that passes is handed to the pipeline unchanged.

use url::Url;

use crate::error::ValidationError;

/// A validated request: the absolute HTTP(S) URL of the image to filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    image_url: Url,
}

impl ImageRequest {
    pub fn url(&self) -> &Url {
        &self.image_url
    }

    pub fn into_url(self) -> Url {
        self.image_url
    }
}

/// Validates the raw `image_url` query value.
///
/// - `None` or an empty/blank string → [`ValidationError::MissingParam`]
/// - not an absolute URL, or a scheme other than `http`/`https` → [`ValidationError::InvalidUrl`]
pub fn validate_image_url(raw: Option<&str>) -> Result<ImageRequest, ValidationError> {
    let raw = match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return Err(ValidationError::MissingParam),
    };

    // Url::parse has no base, so relative references fail here.
    let image_url = Url::parse(raw).map_err(|_| ValidationError::InvalidUrl)?;
    if !matches!(image_url.scheme(), "http" | "https") || !image_url.has_host() {
        return Err(ValidationError::InvalidUrl);
    }

    Ok(ImageRequest { image_url })
}
