//! Configuration for Slabfolio.
//!
//! The original deployment kept its browser endpoint inline in the code;
//! here everything reaches the callers through [`AppConfig`], layered from
//! defaults, an optional config file, and `SLAB_`-prefixed environment
//! variables.

use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "data/collections.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// How card pages are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Headless Chrome with JavaScript rendering (required for live pages)
    Browser,
    /// Plain GET; parses saved snapshots, yields empty fields on live pages
    Http,
}

impl Default for FetchMode {
    fn default() -> Self {
        FetchMode::Browser
    }
}

/// Fetch transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    #[serde(default)]
    pub mode: FetchMode,
    /// Remote DevTools websocket endpoint (e.g. a hosted browser pool);
    /// a local Chrome is launched when unset
    #[serde(default)]
    pub remote_ws_url: Option<String>,
    /// Chrome executable override for local launches
    #[serde(default)]
    pub chrome_path: Option<String>,
    #[serde(default = "default_render_wait_ms")]
    pub render_wait_ms: u64,
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,
}

fn default_render_wait_ms() -> u64 {
    3000
}

fn default_page_timeout_secs() -> u64 {
    30
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::default(),
            remote_ws_url: None,
            chrome_path: None,
            render_wait_ms: default_render_wait_ms(),
            page_timeout_secs: default_page_timeout_secs(),
        }
    }
}

/// Scrape politeness and caching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: i64,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: f64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: f64,
}

fn default_cache_dir() -> String {
    "data/cache/pages".to_string()
}

fn default_cache_ttl_hours() -> i64 {
    24
}

fn default_requests_per_minute() -> u32 {
    30
}

fn default_min_delay_secs() -> f64 {
    0.5
}

fn default_max_delay_secs() -> f64 {
    1.5
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            cache_ttl_hours: default_cache_ttl_hours(),
            requests_per_minute: default_requests_per_minute(),
            min_delay_secs: default_min_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables (SLAB_SERVER_PORT, etc.)
            .add_source(
                config::Environment::with_prefix("SLAB")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.fetcher.mode, FetchMode::Browser);
        assert!(config.fetcher.remote_ws_url.is_none());
        assert_eq!(config.scrape.cache_ttl_hours, 24);
    }

    #[test]
    fn test_fetch_mode_from_str() {
        let mode: FetchMode = serde_json::from_str("\"http\"").unwrap();
        assert_eq!(mode, FetchMode::Http);
        let mode: FetchMode = serde_json::from_str("\"browser\"").unwrap();
        assert_eq!(mode, FetchMode::Browser);
    }
}
