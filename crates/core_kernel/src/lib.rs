//! Core Kernel - Foundational types shared across the pageshare workspace
//!
//! This crate provides the building blocks every other crate depends on:
//! - Strongly-typed identifiers for users, pages and link items
//! - The request-scoped [`Context`] used to carry values down a call chain
//! - The [`TransactionService`] port through which domain services run atomic
//!   units of work without knowing about the database driver

pub mod context;
pub mod error;
pub mod identifiers;
pub mod ports;

pub use context::Context;
pub use error::CoreError;
pub use identifiers::{LinkItemId, PageId, UserId};
pub use ports::{BoxError, TransactionError, TransactionService};
