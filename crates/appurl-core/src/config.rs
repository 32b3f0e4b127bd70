use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::url_model::ParseContext;

/// Network transfer parameters (optional `[transfer]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-transfer timeout in seconds.
    pub timeout_secs: u64,
    /// Abort when slower than this many bytes/sec for `low_speed_time_secs`.
    pub low_speed_limit: u32,
    pub low_speed_time_secs: u64,
    /// Maximum HTTP redirects followed.
    pub max_redirections: u32,
    /// Optional User-Agent header; libcurl sends none by default.
    pub user_agent: Option<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 3600,
            low_speed_limit: 1024,
            low_speed_time_secs: 60,
            max_redirections: 10,
            user_agent: None,
        }
    }
}

impl TransferConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn low_speed_time(&self) -> Duration {
        Duration::from_secs(self.low_speed_time_secs)
    }
}

/// Global configuration loaded from `~/.config/appurl/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppUrlConfig {
    /// Cache root; defaults to `$XDG_CACHE_HOME/appurl`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Base directory for relative `file` URLs; defaults to the process cwd.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Re-download even when the cache already holds the resource.
    #[serde(default)]
    pub clean: bool,
    #[serde(default)]
    pub transfer: TransferConfig,
    /// DSN name -> connection URL for `sql://name` URLs.
    #[serde(default)]
    pub dsns: BTreeMap<String, String>,
}

impl AppUrlConfig {
    /// Configured cache directory, or the XDG default.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_cache_dir(),
        }
    }

    pub fn parse_context(&self) -> ParseContext {
        ParseContext::with_dsns(self.dsns.clone())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("appurl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

pub fn default_cache_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("appurl")?;
    Ok(xdg_dirs.get_cache_home().join("appurl"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<AppUrlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = AppUrlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

pub fn load_from(path: &Path) -> Result<AppUrlConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg: AppUrlConfig = toml::from_str(&data)
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
