//! The fixed image transform: resize, greyscale, JPEG encode.

use crate::config::FilterConfig;
use crate::error::FilterError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::io::Cursor;

/// Decodes `bytes` (format guessed from content), resizes to exactly
/// `width`x`height`, converts to greyscale and returns the JPEG encoding.
///
/// CPU-bound; call from `spawn_blocking` when used from async code.
pub fn apply(bytes: &[u8], cfg: &FilterConfig) -> Result<Vec<u8>, FilterError> {
    let img = image::load_from_memory(bytes).map_err(FilterError::Decode)?;
    let grey = img
        .resize_exact(cfg.width.max(1), cfg.height.max(1), FilterType::Triangle)
        .grayscale()
        .to_luma8();

    let mut out = Cursor::new(Vec::new());
    let quality = cfg.jpeg_quality.clamp(1, 100);
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&grey)
        .map_err(FilterError::Encode)?;
    Ok(out.into_inner())
}
