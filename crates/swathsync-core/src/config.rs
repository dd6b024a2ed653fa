use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Environment variable that overrides `token` from the config file.
pub const TOKEN_ENV: &str = "SWATHSYNC_TOKEN";

pub const DEFAULT_BASE_URL: &str = "https://ladsweb.modaps.eosdis.nasa.gov";
pub const DEFAULT_LISTING_TEMPLATE: &str =
    "/archive/Science Domain/Atmosphere/Aerosol/MODIS {product} C6.1 - Aerosol 5-Min L2 Swath 10km/{year}/{doy}";

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per file (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds; the n-th retry waits `base * 2^n`.
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 1.0,
            max_delay_secs: 120,
        }
    }
}

/// Global configuration loaded from `~/.config/swathsync/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct SwathConfig {
    /// Scheme and host of the archive, e.g. `https://ladsweb.modaps.eosdis.nasa.gov`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Listing path with `{product}`, `{year}` and `{doy}` placeholders.
    #[serde(default = "default_listing_template")]
    pub listing_template: String,
    /// Local root; files land in `<root>/<product>/<year>/<name>`.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Products mirrored on every run.
    #[serde(default = "default_products")]
    pub products: Vec<String>,
    /// Bearer token. Prefer `SWATHSYNC_TOKEN` over storing it here.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Maximum concurrent file fetches within one bucket.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Abort an attempt after this long without receiving data.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Hard cap on one transfer, whatever its progress.
    #[serde(default = "default_transfer_timeout_secs")]
    pub transfer_timeout_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_listing_template() -> String {
    DEFAULT_LISTING_TEMPLATE.to_string()
}

fn default_root() -> PathBuf {
    xdg::BaseDirectories::with_prefix("swathsync")
        .map(|dirs| dirs.get_data_home())
        .unwrap_or_else(|_| PathBuf::from("swathsync-data"))
}

fn default_products() -> Vec<String> {
    vec!["Aqua".to_string(), "Terra".to_string()]
}

fn default_user_agent() -> String {
    format!("swathsync/{}", env!("CARGO_PKG_VERSION"))
}

fn default_workers() -> usize {
    5
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_transfer_timeout_secs() -> u64 {
    3600
}

impl Default for SwathConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            listing_template: default_listing_template(),
            root: default_root(),
            products: default_products(),
            token: None,
            user_agent: default_user_agent(),
            workers: default_workers(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            transfer_timeout_secs: default_transfer_timeout_secs(),
            retry: None,
        }
    }
}

// Hand-written so the token never reaches the logs.
impl std::fmt::Debug for SwathConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwathConfig")
            .field("base_url", &self.base_url)
            .field("listing_template", &self.listing_template)
            .field("root", &self.root)
            .field("products", &self.products)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent)
            .field("workers", &self.workers)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("transfer_timeout_secs", &self.transfer_timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

impl SwathConfig {
    /// Retry policy for file fetches, from the `[retry]` section or defaults.
    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = self.retry.clone().unwrap_or_default();
        let max_delay = Duration::from_secs(retry.max_delay_secs);
        // Out-of-range or infinite bases clamp to the cap.
        let base_delay = Duration::try_from_secs_f64(retry.base_delay_secs.max(0.0))
            .unwrap_or(max_delay)
            .min(max_delay);
        RetryPolicy {
            max_attempts: retry.max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Token from `SWATHSYNC_TOKEN` if set and non-empty, else from the file.
    pub fn resolved_token(&self) -> Option<String> {
        resolve_token(std::env::var(TOKEN_ENV).ok(), self.token.as_deref())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    /// Worker count, never below one.
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }
}

fn resolve_token(from_env: Option<String>, from_file: Option<&str>) -> Option<String> {
    from_env
        .filter(|t| !t.trim().is_empty())
        .or_else(|| from_file.map(str::to_string))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("swathsync")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SwathConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

/// Same as `load_or_init` for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<SwathConfig> {
    if !path.exists() {
        let default_cfg = SwathConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)
            .with_context(|| format!("failed to write default config: {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let cfg: SwathConfig =
        toml::from_str(&data).with_context(|| format!("invalid config: {}", path.display()))?;
    Ok(cfg)
}
