//! Test Utilities Crate
//!
//! Provides shared test infrastructure for the pageshare test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built users and pages
//! - `database`: PostgreSQL testcontainer with the schema applied

pub mod database;
pub mod fixtures;

pub use database::*;
pub use fixtures::*;
