//! User Domain
//!
//! Users start out anonymous, identified only by the `uid` issued by the
//! identity provider, and may later log in once with one of the supported
//! providers, which records their email address.
//!
//! # Examples
//!
//! ```rust
//! use domain_user::{Provider, User};
//!
//! let mut user = User::new("firebase-uid-1");
//! assert_eq!(user.provider(), Provider::Anonymous);
//!
//! user.login("google", Some("ann@example.com".to_string())).unwrap();
//! assert_eq!(user.provider(), Provider::Google);
//! assert!(user.login("facebook", Some("ann@example.com".to_string())).is_err());
//! ```

pub mod context;
pub mod error;
pub mod ports;
pub mod service;
pub mod user;

pub use context::{user_from_context, with_user};
pub use error::UserError;
pub use ports::UserRepository;
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockUserRepository;
pub use service::UserService;
pub use user::{Provider, User};
