use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Environment variable that overrides the listen port.
pub const PORT_ENV: &str = "PORT";

/// Remote fetch limits (optional `[fetch]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Seconds allowed for the TCP/TLS connect phase.
    pub connect_timeout_secs: u64,
    /// Seconds allowed for the whole transfer (0 = no limit).
    pub timeout_secs: u64,
    /// Largest accepted response body in bytes (0 = no limit).
    pub max_bytes: u64,
    /// Maximum number of redirects followed.
    pub max_redirections: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            timeout_secs: 60,
            max_bytes: 25 * 1024 * 1024,
            max_redirections: 10,
        }
    }
}

/// Parameters of the fixed filter transform (optional `[filter]` section).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub width: u32,
    pub height: u32,
    /// JPEG quality, 1..=100.
    pub jpeg_quality: u8,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            jpeg_quality: 60,
        }
    }
}

/// Global configuration loaded from `~/.config/imgfilter/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind, e.g. "0.0.0.0" or "127.0.0.1".
    pub bind_host: String,
    /// TCP port to listen on. Overridden by `PORT` and `--port`.
    pub port: u16,
    /// Directory for transient filtered artifacts. None = `<tmp>/imgfilter`.
    pub artifact_dir: Option<PathBuf>,
    /// Startup sweep only removes artifacts older than this many seconds.
    pub sweep_after_secs: u64,
    /// Log to `~/.local/state/imgfilter/imgfilter.log` instead of stderr.
    pub log_to_file: bool,
    pub fetch: FetchConfig,
    pub filter: FilterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 8082,
            artifact_dir: None,
            sweep_after_secs: 3600,
            log_to_file: false,
            fetch: FetchConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Resolved artifact directory.
    pub fn artifact_dir(&self) -> PathBuf {
        self.artifact_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("imgfilter"))
    }

    /// Apply the `PORT` override from the given value (as read from the environment).
    pub fn apply_port_env(&mut self, value: Option<&str>) -> Result<()> {
        if let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.port = raw
                .parse()
                .with_context(|| format!("invalid {} value: {:?}", PORT_ENV, raw))?;
        }
        Ok(())
    }

    /// "host:port" string for binding the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("imgfilter")?;
    Ok(xdg_dirs.get_config_home().join("imgfilter").join("config.toml"))
}

/// Load configuration from disk, falling back to defaults when no file exists,
/// then apply the `PORT` environment override.
pub fn load() -> Result<ServerConfig> {
    let path = config_path()?;
    let mut cfg = if path.exists() {
        let data = fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        let cfg: ServerConfig =
            toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
        tracing::debug!("loaded config from {}", path.display());
        cfg
    } else {
        ServerConfig::default()
    };
    cfg.apply_port_env(std::env::var(PORT_ENV).ok().as_deref())?;
    Ok(cfg)
}
