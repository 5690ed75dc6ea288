use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::address::AddressPolicy;
use crate::retry::RetryPolicy;

/// Default registry host.
pub const DEFAULT_ENDPOINT: &str = "https://www.modelscope.cn";

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per request (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    /// Convert to the runtime policy. Negative or NaN delays collapse to zero.
    pub fn to_policy(&self) -> RetryPolicy {
        let base = if self.base_delay_secs.is_finite() && self.base_delay_secs > 0.0 {
            Duration::from_secs_f64(self.base_delay_secs)
        } else {
            Duration::ZERO
        };
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: base,
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/msv6/config.toml`.
/// Fields missing from the file take their default value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Msv6Config {
    /// Registry base URL (scheme + host).
    pub endpoint: String,
    /// Repository revision (branch or tag) used for listings and file URLs.
    pub revision: String,
    /// Number of files requested per listing page.
    pub page_size: u32,
    /// Default number of concurrent downloads.
    pub workers: usize,
    /// Default per-file stall/connect timeout in seconds.
    pub timeout_secs: u64,
    /// Prefer IPv6 by default (same as passing `--ipv6`).
    #[serde(default)]
    pub ipv6: bool,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for Msv6Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            revision: "master".to_string(),
            page_size: 100,
            workers: 4,
            timeout_secs: 60,
            ipv6: false,
            retry: None,
        }
    }
}

impl Msv6Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryConfig::to_policy)
            .unwrap_or_default()
    }

    /// Address policy from config, upgraded to `PreferIpv6` when `force_ipv6` is set.
    pub fn address_policy(&self, force_ipv6: bool) -> AddressPolicy {
        if force_ipv6 || self.ipv6 {
            AddressPolicy::PreferIpv6
        } else {
            AddressPolicy::Auto
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("msv6")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<Msv6Config> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = Msv6Config::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: Msv6Config = toml::from_str(&data)?;
    Ok(cfg)
}
