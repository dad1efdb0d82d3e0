//! serp-harvest: a rate-limited search result harvester
//!
//! This crate pages through a search API for one query at a time, drops
//! results whose URL matches a domain denylist, and appends the rest to an
//! output file, while staying inside the API's request rate and backing off
//! when the API pushes back.

pub mod config;
pub mod filter;
pub mod output;
pub mod search;
pub mod state;

use std::time::Duration;
use thiserror::Error;

/// Main error type for serp-harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Query is empty after whitespace normalization")]
    EmptyQuery,

    #[error("HTTP error for query '{query}': {source}")]
    Http {
        query: String,
        source: reqwest::Error,
    },

    #[error("Unexpected response status {status} for query '{query}': {message}")]
    UnexpectedStatus {
        query: String,
        status: u16,
        message: String,
    },

    #[error("Rate limited on query '{query}': next backoff would exceed the {ceiling:?} ceiling")]
    RateLimitCeiling { query: String, ceiling: Duration },

    #[error("Failed to decode search response for query '{query}': {source}")]
    Decode {
        query: String,
        source: serde_json::Error,
    },

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl HarvestError {
    /// Returns true if this error should stop a multi-query run
    ///
    /// Hitting the backoff ceiling means the API quota is exhausted beyond
    /// recovery, so every following query would fail the same way. All other
    /// errors only end the query they occurred in.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, Self::RateLimitCeiling { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid denylist entry: {0}")]
    InvalidDenylistEntry(String),
}

/// Result type alias for serp-harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use filter::{Denylist, Filter};
pub use search::{FetchController, Harvester, Query, SessionOutcome, SessionReport};
pub use state::{SessionPhase, SessionState};
