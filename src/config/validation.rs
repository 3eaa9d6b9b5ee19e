//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use super::Settings;
use crate::utils::errors::{ClubError, Result};

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_database_config(&settings.database)?;
    validate_redis_config(&settings.redis)?;
    validate_store_config(&settings.store)?;
    validate_auth_config(&settings.auth)?;
    validate_image_host_config(&settings.image_host)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(ClubError::Config("Database URL is required".to_string()));
    }

    if config.max_connections == 0 {
        return Err(ClubError::Config(
            "Max connections must be greater than 0".to_string(),
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(ClubError::Config(
            "Min connections cannot be greater than max connections".to_string(),
        ));
    }

    Ok(())
}

fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(ClubError::Config("Redis URL is required".to_string()));
    }

    Ok(())
}

fn validate_store_config(config: &super::StoreConfig) -> Result<()> {
    if config.call_timeout_ms == 0 {
        return Err(ClubError::Config(
            "Store call timeout must be greater than 0".to_string(),
        ));
    }

    if config.max_conflict_retries == 0 {
        return Err(ClubError::Config(
            "At least one conflict retry is required".to_string(),
        ));
    }

    Ok(())
}

fn validate_auth_config(config: &super::AuthConfig) -> Result<()> {
    url::Url::parse(&config.endpoint)
        .map_err(|e| ClubError::Config(format!("Invalid identity endpoint: {}", e)))?;

    if config.timeout_seconds == 0 {
        return Err(ClubError::Config(
            "Identity provider timeout must be greater than 0".to_string(),
        ));
    }

    if config.sign_in_attempts_per_minute == 0 {
        return Err(ClubError::Config(
            "Sign-in rate limit must allow at least one attempt".to_string(),
        ));
    }

    Ok(())
}

fn validate_image_host_config(config: &super::ImageHostConfig) -> Result<()> {
    url::Url::parse(&config.upload_url)
        .map_err(|e| ClubError::Config(format!("Invalid image upload URL: {}", e)))?;

    if config.upload_preset.is_empty() {
        return Err(ClubError::Config("Image upload preset is required".to_string()));
    }

    Ok(())
}

fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(ClubError::Config(format!(
            "Invalid log level: {}. Valid levels: {:?}",
            config.level, valid_levels
        )));
    }

    if !matches!(config.format.as_str(), "pretty" | "json") {
        return Err(ClubError::Config(format!(
            "Invalid log format: {}. Use \"pretty\" or \"json\"",
            config.format
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_log_level() {
        let mut settings = Settings::default();
        settings.logging.level = "verbose".to_string();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_rejects_inverted_pool_bounds() {
        let mut settings = Settings::default();
        settings.database.min_connections = 20;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_rejects_malformed_endpoint() {
        let mut settings = Settings::default();
        settings.auth.endpoint = "not a url".to_string();
        assert!(validate_settings(&settings).is_err());
    }
}
