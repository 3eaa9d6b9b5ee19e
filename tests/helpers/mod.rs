//! Test helpers module
//!
//! Shared context, fixtures and mock HTTP servers for the ClubHub
//! integration tests.

#![allow(dead_code)]

pub mod identity_mock;
pub mod test_context;
pub mod test_data;

pub use identity_mock::*;
pub use test_context::*;
pub use test_data::*;
