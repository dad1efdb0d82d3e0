//! Configuration module for serp-harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use serp_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("serp-harvest.toml")).unwrap();
//! println!("Result cap per query: {}", config.limits.result_cap);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, Config, DenylistEntry, LimitsConfig, OutputConfig, RateStrategy, RetryConfig,
    DEFAULT_ENDPOINT,
};

// Re-export parser functions
pub use parser::{load_config, parse_config, parse_config_str};
pub use validation::validate;
