use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while collecting, storing or combining market data.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },

    #[error("failed to parse {what}: {message}")]
    Parse { what: &'static str, message: String },

    #[error("no observations returned by {0}")]
    Empty(&'static str),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no data store at {}, run `collect --hist` first", .0.display())]
    StoreMissing(PathBuf),

    #[error("no tables to combine")]
    NoData,
}

impl MarketDataError {
    pub fn api(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Api {
            provider,
            message: message.into(),
        }
    }

    pub fn parse(what: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            what,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketDataError>;
