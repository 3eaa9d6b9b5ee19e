//! Error handling for ClubHub
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy.

use thiserror::Error;

use crate::database::StoreError;

/// Which immutability rule rejected a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmutableRule {
    /// The event's date and start time are already in the past
    PastEvent,
    /// GBM/meeting attendance was already marked for this participant
    FrozenAttendance,
}

impl std::fmt::Display for ImmutableRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImmutableRule::PastEvent => write!(f, "event has already taken place"),
            ImmutableRule::FrozenAttendance => {
                write!(f, "attendance already marked, cannot be modified")
            }
        }
    }
}

/// Main error type for ClubHub
#[derive(Error, Debug)]
pub enum ClubError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Permission denied: {0}")]
    Authorization(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Invalid state: {0}")]
    State(String),

    #[error("Immutable: {0}")]
    ImmutableState(ImmutableRule),

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Result type alias for ClubHub operations
pub type Result<T> = std::result::Result<T, ClubError>;

impl From<config::ConfigError> for ClubError {
    fn from(err: config::ConfigError) -> Self {
        ClubError::Config(err.to_string())
    }
}

impl ClubError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ClubError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Message suitable for showing to the person who triggered the action
    pub fn user_message(&self) -> String {
        match self {
            ClubError::Validation(msg) => msg.clone(),
            ClubError::NotFound { entity, .. } => format!("The requested {} no longer exists", entity),
            ClubError::Authorization(msg) => msg.clone(),
            ClubError::Duplicate(msg) => msg.clone(),
            ClubError::State(msg) => msg.clone(),
            ClubError::ImmutableState(ImmutableRule::PastEvent) => {
                "This event has already taken place and can no longer be changed".to_string()
            }
            ClubError::ImmutableState(ImmutableRule::FrozenAttendance) => {
                "Attendance has already been marked for this participant and cannot be modified"
                    .to_string()
            }
            ClubError::Conflict(_) => {
                "Someone else updated this record at the same time, please try again".to_string()
            }
            ClubError::Authentication(msg) => msg.clone(),
            ClubError::RateLimitExceeded => {
                "Too many attempts, please wait a minute and try again".to_string()
            }
            _ => "Something went wrong, please try again later".to_string(),
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClubError::Validation(_) => false,
            ClubError::NotFound { .. } => false,
            ClubError::Authorization(_) => false,
            ClubError::Duplicate(_) => false,
            ClubError::State(_) => false,
            ClubError::ImmutableState(_) => false,
            ClubError::Conflict(_) => true,
            ClubError::Authentication(_) => false,
            ClubError::RateLimitExceeded => true,
            ClubError::Store(e) => e.is_retryable(),
            ClubError::Http(_) => true,
            ClubError::Redis(_) => true,
            ClubError::Serialization(_) => false,
            ClubError::Config(_) => false,
            ClubError::Io(_) => true,
            ClubError::ServiceUnavailable(_) => true,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ClubError::Config(_) => ErrorSeverity::Critical,
            ClubError::Store(e) if !e.is_retryable() => ErrorSeverity::Critical,
            ClubError::Authorization(_) => ErrorSeverity::Warning,
            ClubError::Authentication(_) => ErrorSeverity::Warning,
            ClubError::RateLimitExceeded => ErrorSeverity::Warning,
            ClubError::Conflict(_) => ErrorSeverity::Warning,
            ClubError::Validation(_)
            | ClubError::Duplicate(_)
            | ClubError::State(_)
            | ClubError::ImmutableState(_)
            | ClubError::NotFound { .. } => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
