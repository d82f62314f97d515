//! Configuration management for regscope.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::site::SiteDefinition;
use crate::types::ResourceKind;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/regscope/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP shell settings
    pub server: ServerConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Resource cache settings
    pub cache: CacheConfig,
    /// Retry budget for network-dependent steps
    pub retry: RetryConfig,
    /// Whole-crawl settings
    pub crawl: CrawlConfig,
    /// Target site selectors and timing
    pub site: SiteDefinition,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `REGSCOPE_HEADLESS`: Override browser headless mode (true/false)
    /// - `REGSCOPE_PORT` / `PORT`: Override the HTTP listen port
    /// - `REGSCOPE_CACHE_DIR`: Override the resource cache directory
    /// - `REGSCOPE_CACHE_MODE`: Override the cache mode (`ttl` or `permanent`)
    /// - `REGSCOPE_SITE_FILE`: Load the site definition from a standalone TOML file
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides on top of the current values.
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(val) = std::env::var("REGSCOPE_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        let port = std::env::var("REGSCOPE_PORT").or_else(|_| std::env::var("PORT"));
        if let Ok(val) = port {
            if let Ok(port) = val.parse() {
                self.server.port = port;
                tracing::debug!("Override server.port from env: {}", port);
            }
        }

        if let Ok(val) = std::env::var("REGSCOPE_CACHE_DIR") {
            tracing::debug!("Override cache.directory from env: {}", val);
            self.cache.directory = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("REGSCOPE_CACHE_MODE") {
            match val.to_ascii_lowercase().as_str() {
                "ttl" => self.cache.mode = CacheMode::Ttl,
                "permanent" => self.cache.mode = CacheMode::Permanent,
                other => {
                    return Err(ConfigError::InvalidValue {
                        field: "cache.mode".to_string(),
                        reason: format!("expected `ttl` or `permanent`, got `{other}`"),
                    })
                }
            }
        }

        if let Ok(path) = std::env::var("REGSCOPE_SITE_FILE") {
            self.site = SiteDefinition::load(Path::new(&path))?;
            tracing::debug!("Loaded site definition from {}", path);
        }

        self.validate()
    }

    /// Validate values that would otherwise only fail deep inside a crawl.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.site.validate()
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/regscope/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "regscope", "regscope").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the resource cache directory.
    ///
    /// Honours `cache.directory` when set, otherwise uses the XDG cache
    /// directory: `~/.cache/regscope/resources`
    pub fn cache_dir(&self) -> ConfigResult<PathBuf> {
        if let Some(dir) = &self.cache.directory {
            return Ok(dir.clone());
        }
        let dirs =
            ProjectDirs::from("com", "regscope", "regscope").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.cache_dir().join("resources"))
    }
}

/// HTTP shell settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub host: String,
    /// Listen port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Viewport width
    pub window_width: u32,
    /// Viewport height
    pub window_height: u32,
    /// User agent sent by every session
    pub user_agent: String,
    /// CDP request timeout in seconds
    pub request_timeout_secs: u64,
    /// How long a single selector wait may poll before giving up
    pub selector_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            request_timeout_secs: 30,
            selector_timeout_ms: 10_000,
        }
    }
}

/// Eviction policy of the resource cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    /// Entries expire according to `Cache-Control: max-age`
    Ttl,
    /// Entries are stored once, never expire and never overwritten
    Permanent,
}

/// Resource cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether requests are intercepted at all
    pub enabled: bool,
    /// Eviction policy
    pub mode: CacheMode,
    /// Storage directory (defaults to the XDG cache dir)
    pub directory: Option<PathBuf>,
    /// Hosts whose requests are aborted and never cached
    pub excluded_hosts: Vec<String>,
    /// Resource kinds whose requests are aborted
    pub excluded_kinds: Vec<ResourceKind>,
    /// Resource kinds eligible for storage
    pub cacheable_kinds: Vec<ResourceKind>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: CacheMode::Permanent,
            directory: None,
            excluded_hosts: vec![
                "www.google-analytics.com".to_string(),
                "www.googletagmanager.com".to_string(),
                "connect.facebook.net".to_string(),
            ],
            excluded_kinds: vec![ResourceKind::Media, ResourceKind::Font],
            cacheable_kinds: vec![
                ResourceKind::Document,
                ResourceKind::Script,
                ResourceKind::Stylesheet,
                ResourceKind::Image,
            ],
        }
    }
}

/// Backoff shape between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackoffKind {
    /// Same delay before every retry
    Fixed,
    /// Delay grows by `delay_ms` on each retry
    Linear,
}

/// Retry budget for network-dependent steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per operation, including the first one
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds
    pub delay_ms: u64,
    /// Backoff shape
    pub backoff: BackoffKind,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
            backoff: BackoffKind::Fixed,
        }
    }
}

/// Whole-crawl settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Upper bound on one crawl invocation in seconds (0 = unbounded)
    pub deadline_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self { deadline_secs: 300 }
    }
}
