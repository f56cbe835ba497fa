//! Page domain errors

use core_kernel::{BoxError, TransactionError};
use domain_user::UserError;
use thiserror::Error;

/// Errors that can occur in the page domain
#[derive(Debug, Error)]
pub enum PageError {
    #[error("page not found")]
    PageNotFound,

    /// No user is bound to the request
    #[error("user not found")]
    UserNotFound,

    #[error("no title provided")]
    NoTitleProvided,

    #[error("title is {length} characters long, at most {max} are allowed")]
    TitleTooLong { length: usize, max: usize },

    #[error("page not created by the user")]
    NotCreatedByUser,

    #[error("invalid links length")]
    InvalidLinksLength,

    #[error("link not found: {0}")]
    LinkNotFound(String),

    #[error("invalid invite code")]
    InvalidInviteCode,

    #[error("the creator cannot join their own page")]
    CreatorCannotJoin,

    #[error("user already joined the page")]
    AlreadyJoined,

    #[error(transparent)]
    User(#[from] UserError),

    /// The storage backend failed
    #[error("page repository error: {0}")]
    Repository(#[source] BoxError),

    /// The unit of work failed for a reason other than a page rule
    #[error(transparent)]
    Transaction(Box<TransactionError<PageError>>),
}

impl PageError {
    /// Wraps a storage failure
    pub fn repository(error: impl Into<BoxError>) -> Self {
        PageError::Repository(error.into())
    }

    /// Returns true for failures caused by the caller rather than the system
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            PageError::Repository(_) | PageError::Transaction(_) | PageError::User(_)
        )
    }
}

impl From<TransactionError<PageError>> for PageError {
    fn from(error: TransactionError<PageError>) -> Self {
        match error {
            TransactionError::Aborted(source) => source,
            other => PageError::Transaction(Box::new(other)),
        }
    }
}
