//! Page Domain
//!
//! A page is a titled, ordered list of links owned by the user who created
//! it. Other users join a page with its invite code and may then edit it like
//! the creator.
//!
//! # Examples
//!
//! ```rust
//! use domain_page::Page;
//! use domain_user::User;
//!
//! let owner = User::new("uid-owner");
//! let guest = User::new("uid-guest");
//!
//! let mut page = Page::new("Reading list", &owner).unwrap();
//! page.add_link(&owner, "https://www.rust-lang.org", "home").unwrap();
//! assert!(page.add_link(&guest, "https://crates.io", "").is_err());
//!
//! let code = page.invite_code().to_string();
//! page.join(&guest, &code).unwrap();
//! page.add_link(&guest, "https://crates.io", "").unwrap();
//! assert_eq!(page.links().len(), 2);
//! ```

pub mod error;
pub mod link;
pub mod page;
pub mod ports;
pub mod service;

pub use error::PageError;
pub use link::{Link, Links};
pub use page::{Page, INVITE_CODE_ALPHABET, INVITE_CODE_LENGTH, MAX_TITLE_LENGTH};
pub use ports::{PageQuery, PageRepository};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockPageRepository;
pub use service::PageService;
