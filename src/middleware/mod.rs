//! Middleware module
//!
//! Cross-cutting checks applied before service operations run.

pub mod auth;
pub mod rate_limit;

pub use auth::{Authorizer, Permission};
pub use rate_limit::SignInRateLimiter;
