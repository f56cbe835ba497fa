//! Persistence ports shared by the domain crates
//!
//! Domain services never talk to the database driver directly. They receive a
//! [`TransactionService`] and repository ports, and wrap multi-step writes in a
//! unit of work:
//!
//! ```rust,ignore
//! txn.run_in_transaction(&ctx, |ctx| async move {
//!     let user = users.save(&ctx, &user).await?;
//!     pages.save(&ctx, &page).await?;
//!     Ok::<_, PageError>(user)
//! })
//! .await?;
//! ```
//!
//! The context handed to the closure must be passed unchanged to every
//! repository call made inside it; that is how repositories find the active
//! transaction.
//!
//! # Nesting
//!
//! A unit of work started while another one is active in the same context does
//! not open a second physical transaction. It runs inside a savepoint of the
//! outer transaction instead, so a failing inner unit only discards its own
//! writes.
//!
//! # Caller contract
//!
//! A transactional context belongs to one logical call chain. Running two
//! units of work concurrently on clones of the same transactional context is
//! not supported; savepoint bookkeeping requires strictly sequential use.

use std::error::Error;
use std::fmt;
use std::future::Future;

use async_trait::async_trait;

use crate::context::Context;

/// Boxed driver-level failure carried inside [`TransactionError`]
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Outcome of a failed unit of work
///
/// The closure's own error `E` is never replaced. It is returned as-is inside
/// [`TransactionError::Aborted`] when the rollback succeeded, and alongside the
/// rollback failure in [`TransactionError::RollbackFailed`] when it did not.
#[derive(Debug)]
pub enum TransactionError<E> {
    /// The transaction or savepoint could not be opened; the closure never ran
    Begin(BoxError),

    /// The closure failed and its writes were rolled back
    Aborted(E),

    /// The closure failed and rolling its writes back failed as well
    RollbackFailed { source: E, rollback: BoxError },

    /// The closure succeeded but its savepoint could not be released
    Release(BoxError),

    /// The closure succeeded but the transaction could not be committed
    Commit(BoxError),
}

impl<E> TransactionError<E> {
    /// Wraps a failure to open a transaction or savepoint
    pub fn begin<X: Into<BoxError>>(error: X) -> Self {
        TransactionError::Begin(error.into())
    }

    /// Wraps a failure to release a savepoint
    pub fn release<X: Into<BoxError>>(error: X) -> Self {
        TransactionError::Release(error.into())
    }

    /// Wraps a failure to commit
    pub fn commit<X: Into<BoxError>>(error: X) -> Self {
        TransactionError::Commit(error.into())
    }

    /// Returns the closure's error, if the closure is what failed
    pub fn source_error(&self) -> Option<&E> {
        match self {
            TransactionError::Aborted(source)
            | TransactionError::RollbackFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Consumes the error and returns the closure's error, if there is one
    pub fn into_source(self) -> Result<E, Self> {
        match self {
            TransactionError::Aborted(source)
            | TransactionError::RollbackFailed { source, .. } => Ok(source),
            other => Err(other),
        }
    }

    /// Returns the rollback failure that accompanied the closure's error
    pub fn rollback_error(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        match self {
            TransactionError::RollbackFailed { rollback, .. } => Some(rollback.as_ref()),
            _ => None,
        }
    }

    /// Returns true if the failure came from the database rather than the closure
    pub fn is_infrastructure(&self) -> bool {
        !matches!(self, TransactionError::Aborted(_))
    }

    /// Converts the closure's error type, keeping every other variant intact
    pub fn map_source<F>(self, f: impl FnOnce(E) -> F) -> TransactionError<F> {
        match self {
            TransactionError::Begin(e) => TransactionError::Begin(e),
            TransactionError::Aborted(source) => TransactionError::Aborted(f(source)),
            TransactionError::RollbackFailed { source, rollback } => {
                TransactionError::RollbackFailed {
                    source: f(source),
                    rollback,
                }
            }
            TransactionError::Release(e) => TransactionError::Release(e),
            TransactionError::Commit(e) => TransactionError::Commit(e),
        }
    }
}

impl<E: fmt::Display> fmt::Display for TransactionError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionError::Begin(e) => write!(f, "failed to begin unit of work: {}", e),
            TransactionError::Aborted(source) => fmt::Display::fmt(source, f),
            TransactionError::RollbackFailed { source, rollback } => {
                write!(f, "rollback error: {}, original error: {}", rollback, source)
            }
            TransactionError::Release(e) => write!(f, "failed to release savepoint: {}", e),
            TransactionError::Commit(e) => write!(f, "transaction commit error: {}", e),
        }
    }
}

impl<E> Error for TransactionError<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            // Aborted is transparent: it reports exactly what the closure reported
            TransactionError::Aborted(source) => source.source(),
            TransactionError::RollbackFailed { source, .. } => Some(source),
            TransactionError::Begin(e)
            | TransactionError::Release(e)
            | TransactionError::Commit(e) => Some(e.as_ref()),
        }
    }
}

/// Runs closures as atomic units of work
///
/// Implemented by the database layer; domain services depend on this trait
/// only, which keeps them testable with [`mock::InlineTransactions`].
#[async_trait]
pub trait TransactionService: Send + Sync {
    /// Runs `f` atomically
    ///
    /// `f` receives the context it must pass to repositories. If `ctx` already
    /// carries an active transaction the closure runs inside a savepoint of it;
    /// otherwise a new transaction is started and committed when `f` succeeds.
    ///
    /// A panic inside `f` rolls back the unit of work and is then resumed with
    /// its original payload.
    async fn run_in_transaction<T, E, F, Fut>(
        &self,
        ctx: &Context,
        f: F,
    ) -> Result<T, TransactionError<E>>
    where
        F: FnOnce(Context) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Send;
}

/// In-process stand-ins for tests of code that depends on the ports
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Runs every unit of work inline without any database
    ///
    /// Errors are reported as [`TransactionError::Aborted`]; nothing is rolled
    /// back, so tests should assert on the returned error rather than on state.
    #[derive(Debug, Default)]
    pub struct InlineTransactions {
        calls: AtomicUsize,
    }

    impl InlineTransactions {
        /// Creates a new inline transaction service
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of units of work started so far
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TransactionService for InlineTransactions {
        async fn run_in_transaction<T, E, F, Fut>(
            &self,
            ctx: &Context,
            f: F,
        ) -> Result<T, TransactionError<E>>
        where
            F: FnOnce(Context) -> Fut + Send,
            Fut: Future<Output = Result<T, E>> + Send,
            T: Send,
            E: Send,
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            f(ctx.clone()).await.map_err(TransactionError::Aborted)
        }
    }
}
