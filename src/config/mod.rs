//! Configuration management for the dataset builder
//!
//! This module handles loading and validating configuration from environment variables,
//! TOML files, and command-line overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Batch fetch configuration
    pub fetch: FetchConfig,

    /// Upstream endpoints and fallback switches
    pub sources: SourcesConfig,

    /// Output locations
    pub output: OutputConfig,

    /// CORS relay configuration
    pub relay: RelayConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Batch fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// First year to fetch (inclusive)
    pub start_year: i32,

    /// Last year to fetch (inclusive)
    pub end_year: i32,

    /// Years fetched concurrently per batch
    pub batch_size: usize,

    /// Pause between batches in seconds
    pub batch_delay_secs: u64,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Client-side rate limit (requests per second)
    pub requests_per_second: u32,

    /// Fixed User-Agent; a browser string is picked per request when unset
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            start_year: 1960,
            end_year: 2100,
            batch_size: 5,
            batch_delay_secs: 5,
            request_timeout_secs: 30,
            requests_per_second: 10,
            user_agent: None,
        }
    }
}

/// Upstream endpoints and fallback switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// USNO Astronomical Applications API root
    pub usno_base_url: String,

    /// NASA solar eclipse catalog directory (century pages)
    pub nasa_solar_catalog_url: String,

    /// NASA lunar eclipse catalog directory (century pages)
    pub nasa_lunar_catalog_url: String,

    /// Merge the hardcoded eclipse table after live sources
    pub use_fallback: bool,

    /// Project the fallback table across the range by Saros periods
    pub saros_projection: bool,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            usno_base_url: String::from("https://aa.usno.navy.mil/api"),
            nasa_solar_catalog_url: String::from("https://eclipse.gsfc.nasa.gov/SEcat5"),
            nasa_lunar_catalog_url: String::from("https://eclipse.gsfc.nasa.gov/LEcat5"),
            use_fallback: true,
            saros_projection: true,
        }
    }
}

/// Output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for datasets and checkpoints
    pub data_dir: PathBuf,

    /// Keep checkpoint files after a fully successful run
    pub keep_checkpoints: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            keep_checkpoints: true,
        }
    }
}

/// CORS relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the relay listens on
    pub bind_address: SocketAddr,

    /// Upstream request timeout in seconds
    pub upstream_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            upstream_timeout_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables on top of defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Read from `path` when given, otherwise from the environment
    ///
    /// Not validated; callers that layer further overrides validate after.
    pub fn read(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    /// [`Config::read`] followed by [`Config::validate`]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `COSMIC_*` environment variables
    pub fn apply_env(&mut self) {
        if let Some(v) = env_parse("COSMIC_START_YEAR") {
            self.fetch.start_year = v;
        }
        if let Some(v) = env_parse("COSMIC_END_YEAR") {
            self.fetch.end_year = v;
        }
        if let Some(v) = env_parse("COSMIC_BATCH_SIZE") {
            self.fetch.batch_size = v;
        }
        if let Some(v) = env_parse("COSMIC_BATCH_DELAY") {
            self.fetch.batch_delay_secs = v;
        }
        if let Some(v) = env_parse("COSMIC_REQUEST_TIMEOUT") {
            self.fetch.request_timeout_secs = v;
        }
        if let Some(v) = env_parse("COSMIC_RATE_LIMIT") {
            self.fetch.requests_per_second = v;
        }
        if let Ok(v) = std::env::var("COSMIC_USER_AGENT") {
            self.fetch.user_agent = Some(v);
        }
        if let Ok(v) = std::env::var("COSMIC_USNO_URL") {
            self.sources.usno_base_url = v;
        }
        if let Ok(v) = std::env::var("COSMIC_DATA_DIR") {
            self.output.data_dir = PathBuf::from(v);
        }
        if let Some(v) = env_parse("COSMIC_RELAY_ADDR") {
            self.relay.bind_address = v;
        }
        if let Ok(v) = std::env::var("COSMIC_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("COSMIC_LOG_FORMAT") {
            self.logging.format = v;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let fetch = &self.fetch;

        if !(1..=9999).contains(&fetch.start_year) || !(1..=9999).contains(&fetch.end_year) {
            anyhow::bail!("years must be between 1 and 9999");
        }

        if fetch.start_year > fetch.end_year {
            anyhow::bail!(
                "start_year ({}) must not be after end_year ({})",
                fetch.start_year,
                fetch.end_year
            );
        }

        if fetch.batch_size == 0 {
            anyhow::bail!("batch_size must be greater than 0");
        }

        if fetch.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if fetch.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        if self.relay.upstream_timeout_secs == 0 {
            anyhow::bail!("upstream_timeout_secs must be greater than 0");
        }

        for (name, value) in [
            ("usno_base_url", &self.sources.usno_base_url),
            ("nasa_solar_catalog_url", &self.sources.nasa_solar_catalog_url),
            ("nasa_lunar_catalog_url", &self.sources.nasa_lunar_catalog_url),
        ] {
            url::Url::parse(value).with_context(|| format!("{name} is not a valid URL"))?;
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.request_timeout_secs)
    }

    /// Get the pause between batches as Duration
    #[must_use]
    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.fetch.batch_delay_secs)
    }

    /// Number of years in the configured range
    #[must_use]
    pub fn year_count(&self) -> usize {
        (self.fetch.end_year - self.fetch.start_year + 1).max(0) as usize
    }
}
