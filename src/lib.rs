//! ClubHub
//!
//! Event, registration and attendance core for student club management:
//! the event calendar, registration workflow, attendance marking with its
//! freeze rules, certificate eligibility, feedback, and member profiles over
//! a document store.

#![allow(non_snake_case)]

pub mod config;
pub mod database;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{ClubError, ImmutableRule, Result};

// Re-export main components for easy access
pub use database::{DatabaseService, DocumentStore, MemoryStore};
pub use services::ServiceFactory;
pub use utils::clock::{Clock, FixedClock, SystemClock};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
