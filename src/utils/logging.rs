//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the ClubHub application.

use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::config::LoggingConfig;
use crate::utils::errors::{ClubError, Result};

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file writer on drop and must outlive the program.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.file_path, "clubhub.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let (stdout_layer, file_layer) = if config.format == "json" {
        (
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stdout)
                .boxed(),
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .boxed(),
        )
    } else {
        (
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .boxed(),
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .boxed(),
        )
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ClubError::Config(format!("Failed to install logger: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log event management actions
pub fn log_event_action(event_id: &str, action: &str, user_id: &str, details: Option<&str>) {
    info!(
        event_id = event_id,
        action = action,
        user_id = user_id,
        details = details,
        "Event action performed"
    );
}

/// Log registration lifecycle changes
pub fn log_registration_action(registration_id: &str, action: &str, actor_id: &str) {
    info!(
        registration_id = registration_id,
        action = action,
        actor_id = actor_id,
        "Registration action performed"
    );
}

/// Log attendance marks; these are executive audit entries
pub fn log_attendance_action(event_id: &str, participant_key: &str, status: &str, executive_id: &str) {
    warn!(
        event_id = event_id,
        participant_key = participant_key,
        status = status,
        executive_id = executive_id,
        "Attendance marked"
    );
}

/// Log authentication events
pub fn log_auth_event(uid: Option<&str>, action: &str, success: bool) {
    if success {
        info!(uid = uid, action = action, "Authentication event");
    } else {
        warn!(uid = uid, action = action, "Authentication failed");
    }
}

/// Log API errors with context
pub fn log_api_error(api: &str, error: &str, context: Option<&str>) {
    error!(
        api = api,
        error = error,
        context = context,
        "API error occurred"
    );
}

/// Log document store operations
pub fn log_store_operation(operation: &str, collection: &str, duration_ms: u64, success: bool) {
    if success {
        debug!(
            operation = operation,
            collection = collection,
            duration_ms = duration_ms,
            "Store operation completed"
        );
    } else {
        error!(
            operation = operation,
            collection = collection,
            duration_ms = duration_ms,
            "Store operation failed"
        );
    }
}
