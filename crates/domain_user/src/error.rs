//! User domain errors

use core_kernel::{BoxError, TransactionError};
use thiserror::Error;

use crate::user::Provider;

/// Errors that can occur in the user domain
#[derive(Debug, Error)]
pub enum UserError {
    /// No user is bound to the request, or the user does not exist
    #[error("user not found")]
    UserNotFound,

    #[error("no uid provided")]
    NoUidProvided,

    #[error("no specified email")]
    NoSpecifiedEmail,

    #[error("invalid provider: {0}")]
    InvalidProvider(String),

    #[error("already logged in with provider: {0}")]
    AlreadyLoggedIn(Provider),

    /// The storage backend failed
    #[error("user repository error: {0}")]
    Repository(#[source] BoxError),

    /// The unit of work failed for a reason other than a user rule
    #[error(transparent)]
    Transaction(Box<TransactionError<UserError>>),
}

impl UserError {
    /// Wraps a storage failure
    pub fn repository(error: impl Into<BoxError>) -> Self {
        UserError::Repository(error.into())
    }
}

impl From<TransactionError<UserError>> for UserError {
    fn from(error: TransactionError<UserError>) -> Self {
        match error {
            TransactionError::Aborted(source) => source,
            other => UserError::Transaction(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aborted_unit_unwraps_to_the_rule_error() {
        let err = UserError::from(TransactionError::Aborted(UserError::NoSpecifiedEmail));
        assert!(matches!(err, UserError::NoSpecifiedEmail));
    }

    #[test]
    fn test_infrastructure_failures_are_wrapped() {
        let err = UserError::from(TransactionError::<UserError>::commit(UserError::repository(
            "connection reset",
        )));
        assert!(matches!(err, UserError::Transaction(_)));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            UserError::AlreadyLoggedIn(Provider::Google).to_string(),
            "already logged in with provider: google"
        );
        assert_eq!(
            UserError::InvalidProvider("github".into()).to_string(),
            "invalid provider: github"
        );
    }
}
