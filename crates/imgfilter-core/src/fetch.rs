//! Remote image download.
//!
//! Uses the curl crate (libcurl) for a single GET that follows redirects and
//! buffers the body in memory, bounded by `FetchConfig::max_bytes`.

use crate::config::FetchConfig;
use crate::error::FetchError;
use std::time::Duration;

const USER_AGENT: &str = concat!("imgfilter/", env!("CARGO_PKG_VERSION"));

/// Downloads `url` and returns the response body.
///
/// Runs in the current thread; call from `spawn_blocking` if used from async code.
pub fn fetch_bytes(url: &str, cfg: &FetchConfig) -> Result<Vec<u8>, FetchError> {
    let mut body: Vec<u8> = Vec::new();
    let mut too_large = false;
    let limit = cfg.max_bytes;

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.useragent(USER_AGENT)?;
    easy.follow_location(true)?;
    easy.max_redirections(cfg.max_redirections)?;
    easy.connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))?;
    if cfg.timeout_secs > 0 {
        easy.timeout(Duration::from_secs(cfg.timeout_secs))?;
    }
    if limit > 0 {
        // Rejects early when the server announces Content-Length.
        easy.max_filesize(limit)?;
    }

    let performed = {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            if limit > 0 && body.len() as u64 + data.len() as u64 > limit {
                too_large = true;
                return Ok(0); // abort transfer
            }
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()
    };

    if let Err(e) = performed {
        if too_large || e.is_filesize_exceeded() {
            return Err(FetchError::TooLarge { limit });
        }
        return Err(FetchError::Curl(e));
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http {
            url: url.to_string(),
            code,
        });
    }
    if body.is_empty() {
        return Err(FetchError::Empty {
            url: url.to_string(),
        });
    }

    tracing::debug!(url, bytes = body.len(), "fetched image");
    Ok(body)
}
