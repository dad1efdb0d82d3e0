use crate::config::types::{ApiConfig, Config, DenylistEntry, LimitsConfig, OutputConfig, RetryConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_limits_config(&config.limits)?;
    validate_retry_config(&config.retry)?;
    validate_output_config(&config.output)?;
    validate_denylist(&config.denylist)?;
    Ok(())
}

/// Validates search API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let endpoint = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint: {}", e)))?;

    if endpoint.scheme() != "https" && endpoint.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "Endpoint '{}' must use http or https",
            config.endpoint
        )));
    }

    if config.key.trim().is_empty() {
        return Err(ConfigError::Validation("api key cannot be empty".to_string()));
    }

    if config.cx.trim().is_empty() {
        return Err(ConfigError::Validation("cx cannot be empty".to_string()));
    }

    if config.page_size < 1 || config.page_size > 10 {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and 10, got {}",
            config.page_size
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates rate and volume limits
fn validate_limits_config(config: &LimitsConfig) -> Result<(), ConfigError> {
    if config.requests_per_minute < 1 {
        return Err(ConfigError::Validation(format!(
            "requests_per_minute must be >= 1, got {}",
            config.requests_per_minute
        )));
    }

    if config.result_cap < 1 {
        return Err(ConfigError::Validation(format!(
            "result_cap must be >= 1, got {}",
            config.result_cap
        )));
    }

    Ok(())
}

/// Validates retry and backoff tuning
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.backoff_floor_ms < 1 {
        return Err(ConfigError::Validation(
            "backoff_floor_ms must be >= 1".to_string(),
        ));
    }

    if config.backoff_floor_ms > config.backoff_ceiling_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_floor_ms ({}) cannot exceed backoff_ceiling_ms ({})",
            config.backoff_floor_ms, config.backoff_ceiling_ms
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates denylist entries
///
/// Entries are plain substrings, so only emptiness and embedded whitespace
/// are rejected: an empty entry would block every URL.
fn validate_denylist(entries: &[DenylistEntry]) -> Result<(), ConfigError> {
    for entry in entries {
        if entry.domain.trim().is_empty() {
            return Err(ConfigError::InvalidDenylistEntry(
                "Denylist entry cannot be empty".to_string(),
            ));
        }

        if entry.domain.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidDenylistEntry(format!(
                "Denylist entry '{}' contains whitespace",
                entry.domain
            )));
        }
    }

    Ok(())
}
