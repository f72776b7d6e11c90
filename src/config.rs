//! Crawler configuration
//!
//! Configuration is loaded from a TOML file with `[crawler]` and `[cache]`
//! tables. Every field has a sensible default, so an empty file (or
//! `Config::default()`) yields a working setup pointed at voz.vn.

use crate::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Default politeness delay between HTTP requests, in seconds
pub const DEFAULT_DELAY: f64 = 1.0;

/// Default cache time-to-live in seconds (1 hour)
pub const DEFAULT_CACHE_TTL: u64 = 3600;

/// Main configuration structure for vozgraph
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Base URL of the forum (used to resolve relative links)
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Minimum time between HTTP requests, in seconds
    #[serde(default = "default_delay")]
    pub delay: f64,

    /// User agent string sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Page cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Directory to store cache files (created automatically)
    #[serde(default = "default_cache_dir")]
    pub dir: String,

    /// Time-to-live in seconds; `0` means entries never expire
    #[serde(default = "default_ttl")]
    pub ttl: u64,

    /// Set to `false` to disable caching entirely (reads always miss)
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_base_url() -> String {
    "https://voz.vn".to_string()
}

fn default_delay() -> f64 {
    DEFAULT_DELAY
}

fn default_user_agent() -> String {
    // A desktop browser string; the forum serves Cloudflare challenges to
    // obviously robotic agents.
    "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0".to_string()
}

fn default_cache_dir() -> String {
    ".voz_cache".to_string()
}

fn default_ttl() -> u64 {
    DEFAULT_CACHE_TTL
}

fn default_enabled() -> bool {
    true
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            delay: default_delay(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            ttl: default_ttl(),
            enabled: default_enabled(),
        }
    }
}

/// Loads and validates a configuration file
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - File could not be read, parsed, or validated
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    validate(&config)?;
    Ok(config)
}

/// Validates a configuration, rejecting values the crawler cannot work with
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.crawler.delay < 0.0 || !config.crawler.delay.is_finite() {
        return Err(ConfigError::Validation(format!(
            "delay must be a non-negative number, got {}",
            config.crawler.delay
        )));
    }

    if url::Url::parse(&config.crawler.base_url).is_err() {
        return Err(ConfigError::Validation(format!(
            "base-url is not a valid URL: {}",
            config.crawler.base_url
        )));
    }

    if config.crawler.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent must not be empty".to_string(),
        ));
    }

    if config.cache.enabled && config.cache.dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "cache dir must not be empty when caching is enabled".to_string(),
        ));
    }

    Ok(())
}
