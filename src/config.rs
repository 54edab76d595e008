//! Environment-driven settings.

use crate::error::{MarketDataError, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_STORE_PATH: &str = "./data/oil_market_data.json";
pub const DEFAULT_CHART_DIR: &str = "./charts";
pub const DEFAULT_ECB_BASE_URL: &str = "https://www.ecb.europa.eu";
pub const DEFAULT_ALPHA_VANTAGE_BASE_URL: &str = "https://www.alphavantage.co";
pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

const USER_AGENT: &str = "Mozilla/5.0";

/// Application settings.
///
/// Everything except the Alpha Vantage key has a default, so `show` and
/// `visualize` work without any environment set up.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Alpha Vantage API key, required only for collecting
    pub alpha_vantage_api_key: Option<String>,
    /// JSON table store location
    pub store_path: PathBuf,
    /// Directory charts are written into
    pub chart_dir: PathBuf,
    pub ecb_base_url: String,
    pub alpha_vantage_base_url: String,
    pub yahoo_base_url: String,
    /// Per-request timeout in seconds
    pub http_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            alpha_vantage_api_key: None,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            chart_dir: PathBuf::from(DEFAULT_CHART_DIR),
            ecb_base_url: DEFAULT_ECB_BASE_URL.to_string(),
            alpha_vantage_base_url: DEFAULT_ALPHA_VANTAGE_BASE_URL.to_string(),
            yahoo_base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            http_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Loads `.env` if present, then reads settings from the environment.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        Self {
            alpha_vantage_api_key: std::env::var("ALPHA_VANTAGE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            store_path: env_var_parse("MARKET_STORE_PATH", defaults.store_path),
            chart_dir: env_var_parse("CHART_OUTPUT_DIR", defaults.chart_dir),
            ecb_base_url: env_var_parse("ECB_BASE_URL", defaults.ecb_base_url),
            alpha_vantage_base_url: env_var_parse(
                "ALPHA_VANTAGE_BASE_URL",
                defaults.alpha_vantage_base_url,
            ),
            yahoo_base_url: env_var_parse("YAHOO_BASE_URL", defaults.yahoo_base_url),
            http_timeout_secs: env_var_parse("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Returns the API key or a configuration error naming the variable.
    pub fn require_api_key(&self) -> Result<&str> {
        self.alpha_vantage_api_key.as_deref().ok_or_else(|| {
            MarketDataError::Config("ALPHA_VANTAGE_API_KEY must be set in environment".into())
        })
    }

    /// Shared HTTP client for every collector.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.http_timeout())
            .build()?)
    }
}

/// Parses an environment variable, falling back to the default on absence or error.
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
