//! Database module
//!
//! The document store abstraction, its backends, and the typed repositories
//! built on it.

pub mod change_feed;
pub mod connection;
pub mod memory;
pub mod postgres;
pub mod repositories;
pub mod resilience;
pub mod service;
pub mod store;

// Re-export commonly used database components
pub use change_feed::RedisChangeFeed;
pub use connection::{create_pool, health_check, run_migrations, DatabasePool};
pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;
pub use repositories::{
    AttendanceRepository, EventRepository, FeedbackRepository, PastEventRepository,
    RegistrationRepository, UserRepository,
};
pub use resilience::{ResilientStore, RetryPolicy};
pub use service::DatabaseService;
pub use store::{
    ChangeEvent, ChangeKind, ChangeStream, Collection, Document, DocumentStore, Filter, OrderBy,
    StoreError,
};
