//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub image_host: ImageHostConfig,
    pub attendance: AttendanceConfig,
    pub logging: LoggingConfig,
    pub features: FeaturesConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

/// Redis configuration, used for the store change feed
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
}

/// Document store call policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Upper bound for a single store call
    pub call_timeout_ms: u64,
    /// Retries for idempotent reads and confirmed-unapplied writes
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    /// Re-read attempts for optimistic read-modify-write cycles
    pub max_conflict_retries: u32,
}

/// Identity provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout_seconds: u64,
    pub sign_in_attempts_per_minute: u32,
}

/// Image host configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageHostConfig {
    pub upload_url: String,
    pub upload_preset: String,
    pub timeout_seconds: u64,
    pub max_bytes: usize,
}

/// Attendance policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttendanceConfig {
    pub default_service_hours: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: String,
    /// "pretty" or "json"
    pub format: String,
}

/// Feature flags configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeaturesConfig {
    pub change_feed: bool,
    pub archive_past_events: bool,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::from_file("config")
    }

    /// Load settings from a specific file (extension optional) layered over defaults
    pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
        let defaults = config::Config::try_from(&Settings::default())?;
        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("CLUBHUB").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::ClubError> {
        super::validation::validate_settings(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/clubhub".to_string(),
                max_connections: 10,
                min_connections: 1,
                acquire_timeout_seconds: 30,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                prefix: "clubhub:".to_string(),
            },
            store: StoreConfig {
                call_timeout_ms: 5_000,
                max_retries: 3,
                backoff_base_ms: 100,
                max_conflict_retries: 5,
            },
            auth: AuthConfig {
                endpoint: "https://identitytoolkit.googleapis.com/v1".to_string(),
                api_key: String::new(),
                timeout_seconds: 10,
                sign_in_attempts_per_minute: 5,
            },
            image_host: ImageHostConfig {
                upload_url: "https://api.cloudinary.com/v1_1/clubhub/image/upload".to_string(),
                upload_preset: "clubhub_unsigned".to_string(),
                timeout_seconds: 30,
                max_bytes: 10 * 1024 * 1024,
            },
            attendance: AttendanceConfig {
                default_service_hours: 2,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: "logs".to_string(),
                format: "pretty".to_string(),
            },
            features: FeaturesConfig {
                change_feed: true,
                archive_past_events: false,
            },
        }
    }
}
