use crate::filter::DEFAULT_DENYLIST;
use serde::Deserialize;
use std::time::Duration;

/// Default Custom Search JSON API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Main configuration structure for serp-harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Omitting the table array entirely selects the built-in denylist;
    /// `denylist = []` disables filtering
    #[serde(default = "default_denylist")]
    pub denylist: Vec<DenylistEntry>,
}

impl Config {
    /// Builds a configuration with every optional section at its default
    pub fn with_credentials(key: impl Into<String>, cx: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                endpoint: DEFAULT_ENDPOINT.to_string(),
                key: key.into(),
                cx: cx.into(),
                page_size: default_page_size(),
                timeout_secs: default_timeout_secs(),
            },
            limits: LimitsConfig::default(),
            retry: RetryConfig::default(),
            output: OutputConfig::default(),
            denylist: default_denylist(),
        }
    }

    /// Returns the denylist entries as plain strings
    pub fn denylist_domains(&self) -> Vec<String> {
        self.denylist.iter().map(|e| e.domain.clone()).collect()
    }
}

/// Search API access configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the search endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key sent as the `key` parameter
    #[serde(default)]
    pub key: String,

    /// Search engine identifier sent as the `cx` parameter
    #[serde(default)]
    pub cx: String,

    /// Results requested per page (`num`), the API allows at most 10
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Whole-request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Which rate limiting strategy the governor applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateStrategy {
    /// At most N requests per fixed 60 second window
    Window,
    /// Every request at least 60s / N after the previous one
    Interval,
}

/// Request rate and result volume limits
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_strategy")]
    pub strategy: RateStrategy,

    /// Request budget per minute
    #[serde(rename = "requests-per-minute", default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Maximum accepted results written per query
    #[serde(rename = "result-cap", default = "default_result_cap")]
    pub result_cap: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            requests_per_minute: default_requests_per_minute(),
            result_cap: default_result_cap(),
        }
    }
}

/// Retry and backoff tuning
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries allowed for HTTP 400 responses before the query is abandoned
    #[serde(rename = "max-malformed-retries", default = "default_max_malformed_retries")]
    pub max_malformed_retries: u32,

    /// Fixed wait between HTTP 400 retries (milliseconds)
    #[serde(rename = "malformed-delay-ms", default = "default_malformed_delay_ms")]
    pub malformed_delay_ms: u64,

    /// First wait after an HTTP 429 (milliseconds)
    #[serde(rename = "backoff-floor-ms", default = "default_backoff_floor_ms")]
    pub backoff_floor_ms: u64,

    /// Largest backoff before the run gives up (milliseconds)
    #[serde(rename = "backoff-ceiling-ms", default = "default_backoff_ceiling_ms")]
    pub backoff_ceiling_ms: u64,

    /// Upper bound of the random jitter added to each backoff (milliseconds)
    #[serde(rename = "max-jitter-ms", default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

impl RetryConfig {
    pub fn malformed_delay(&self) -> Duration {
        Duration::from_millis(self.malformed_delay_ms)
    }

    pub fn backoff_floor(&self) -> Duration {
        Duration::from_millis(self.backoff_floor_ms)
    }

    pub fn backoff_ceiling(&self) -> Duration {
        Duration::from_millis(self.backoff_ceiling_ms)
    }

    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_malformed_retries: default_max_malformed_retries(),
            malformed_delay_ms: default_malformed_delay_ms(),
            backoff_floor_ms: default_backoff_floor_ms(),
            backoff_ceiling_ms: default_backoff_ceiling_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the append-only results file
    #[serde(default = "default_output_path")]
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

/// Single denylist entry
#[derive(Debug, Clone, Deserialize)]
pub struct DenylistEntry {
    /// Substring that disqualifies any URL containing it (e.g. "reddit.com")
    pub domain: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_page_size() -> u32 {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_strategy() -> RateStrategy {
    RateStrategy::Window
}

fn default_requests_per_minute() -> u32 {
    50
}

fn default_result_cap() -> u32 {
    100
}

fn default_max_malformed_retries() -> u32 {
    3
}

fn default_malformed_delay_ms() -> u64 {
    2_000
}

fn default_backoff_floor_ms() -> u64 {
    5_000
}

fn default_backoff_ceiling_ms() -> u64 {
    80_000
}

fn default_max_jitter_ms() -> u64 {
    1_000
}

fn default_output_path() -> String {
    "output.txt".to_string()
}

fn default_denylist() -> Vec<DenylistEntry> {
    DEFAULT_DENYLIST
        .iter()
        .map(|domain| DenylistEntry {
            domain: domain.to_string(),
        })
        .collect()
}
