//! Repository implementations for domain entities
//!
//! Each repository implements a domain port on top of the [`Connection`]
//! pool pair. Queries are built at runtime; every call resolves its client
//! from the request context, so repositories take part in whatever unit of
//! work the caller started.
//!
//! [`Connection`]: crate::Connection

pub mod page;
pub mod user;

pub use page::PgPageRepository;
pub use user::PgUserRepository;
