//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL persistence core: a read/write pool
//! pair, request-scoped transactions, savepoint-based nesting and the
//! repository implementations of the domain ports, all on top of SQLx.
//!
//! # Units of work
//!
//! [`Connection`] implements [`core_kernel::TransactionService`]. The outermost
//! `run_in_transaction` begins a transaction on the write pool and hands the
//! closure a context carrying it; repositories called with that context run
//! their queries in the transaction, and a nested `run_in_transaction` opens a
//! savepoint instead of a second transaction.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use infra_db::{Connection, PoolConfig, PgPageRepository};
//!
//! let write = PoolConfig::new("postgres://localhost/pageshare");
//! let read = write.with_url("postgres://replica/pageshare");
//! let connection = Arc::new(Connection::connect(&read, &write).await?);
//! let pages = PgPageRepository::new(Arc::clone(&connection));
//! ```

pub mod client;
pub mod connection;
pub mod context;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod pool;
pub mod repositories;
pub mod savepoint;
pub mod txn;

pub use client::{Client, ClientConn, RelationalPool, RelationalTx};
pub use connection::Connection;
pub use context::{bind_transaction, lookup_transaction};
pub use error::{DatabaseError, SavepointAction};
pub use pool::{create_pool, DatabasePool, DbPool, PoolConfig, PoolRole, DEFAULT_SCHEMA};
pub use repositories::{PgPageRepository, PgUserRepository};
pub use savepoint::Savepoint;
pub use txn::TxnHandle;
