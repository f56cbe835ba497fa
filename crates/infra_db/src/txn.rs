//! Transaction handle
//!
//! A [`TxnHandle`] owns one open transaction plus the savepoint counter that
//! belongs to it. Commit and rollback consume the underlying transaction, so
//! whichever of the two runs first is the only one that reaches the server;
//! any later call gets [`DatabaseError::NoActiveTransaction`].
//!
//! Dropping a handle whose transaction is still open rolls it back through the
//! driver, which is what happens when the future running a unit of work is
//! cancelled. A nested unit that is cancelled leaves its savepoint behind as
//! abandoned; the next operation on the handle rolls back to it before doing
//! anything else, and commit refuses to proceed while that rollback fails.
//!
//! The handle never waits for itself. Only one call chain uses a transaction,
//! so if its connection is still checked out the caller is blocking on its own
//! guard, and operations fail with [`DatabaseError::TransactionBusy`] instead.

use std::fmt;
use std::ops::DerefMut;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

use tokio::sync::{Mutex, MutexGuard, OwnedMappedMutexGuard, OwnedMutexGuard};

use crate::client::RelationalTx;
use crate::error::{DatabaseError, SavepointAction};
use crate::savepoint::{Savepoint, SavepointSeq};

type Abandoned = Arc<StdMutex<Vec<Savepoint>>>;

fn lock_abandoned(abandoned: &StdMutex<Vec<Savepoint>>) -> StdMutexGuard<'_, Vec<Savepoint>> {
    abandoned.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct TxnHandle<T> {
    state: Arc<Mutex<TxnState<T>>>,
    abandoned: Abandoned,
}

pub(crate) struct TxnState<T> {
    tx: Option<T>,
    savepoints: SavepointSeq,
}

impl<T: RelationalTx> TxnHandle<T> {
    pub(crate) fn new(tx: T) -> Self {
        Self {
            state: Arc::new(Mutex::new(TxnState {
                tx: Some(tx),
                savepoints: SavepointSeq::default(),
            })),
            abandoned: Abandoned::default(),
        }
    }

    /// Returns false once the transaction was committed or rolled back
    pub async fn is_active(&self) -> bool {
        self.state.lock().await.tx.is_some()
    }

    /// Number of savepoints opened so far in this transaction
    pub async fn savepoints_issued(&self) -> u64 {
        self.state.lock().await.savepoints.issued()
    }

    /// Commits, after rolling back to any abandoned savepoint
    pub async fn commit(&self) -> Result<(), DatabaseError> {
        let tx = {
            let mut state = self.lock()?;
            self.settle(&mut state).await?;
            state.tx.take().ok_or(DatabaseError::NoActiveTransaction)?
        };
        tx.commit().await
    }

    pub async fn rollback(&self) -> Result<(), DatabaseError> {
        let tx = self
            .lock()?
            .tx
            .take()
            .ok_or(DatabaseError::NoActiveTransaction)?;
        lock_abandoned(&self.abandoned).clear();
        tx.rollback().await
    }

    /// Opens a new uniquely named savepoint
    ///
    /// The counter advances even when the statement fails, so a name is never
    /// handed out twice.
    pub async fn begin_savepoint(&self) -> Result<Savepoint, DatabaseError> {
        let mut state = self.lock()?;
        self.settle(&mut state).await?;
        let TxnState { tx, savepoints } = &mut *state;
        let tx = tx.as_mut().ok_or(DatabaseError::NoActiveTransaction)?;

        let savepoint = savepoints.next();
        tx.execute(&savepoint.create_sql())
            .await
            .map_err(|e| DatabaseError::savepoint(&savepoint, SavepointAction::Create, e))?;
        Ok(savepoint)
    }

    /// Discards everything written since `savepoint` was opened
    pub async fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> Result<(), DatabaseError> {
        self.execute(&savepoint.rollback_sql())
            .await
            .map_err(|e| DatabaseError::savepoint(savepoint, SavepointAction::RollbackTo, e))
    }

    /// Merges the writes made since `savepoint` into the enclosing scope
    pub async fn release_savepoint(&self, savepoint: &Savepoint) -> Result<(), DatabaseError> {
        self.execute(&savepoint.release_sql())
            .await
            .map_err(|e| DatabaseError::savepoint(savepoint, SavepointAction::Release, e))
    }

    /// Arms a guard that marks `savepoint` abandoned if it is dropped
    /// before [`SavepointGuard::disarm`] is called
    pub(crate) fn guard(&self, savepoint: &Savepoint) -> SavepointGuard {
        SavepointGuard {
            abandoned: Arc::clone(&self.abandoned),
            savepoint: Some(savepoint.clone()),
        }
    }

    async fn execute(&self, statement: &str) -> Result<(), DatabaseError> {
        let mut state = self.lock()?;
        self.settle(&mut state).await?;
        let tx = state.tx.as_mut().ok_or(DatabaseError::NoActiveTransaction)?;
        tx.execute(statement).await
    }

    fn lock(&self) -> Result<MutexGuard<'_, TxnState<T>>, DatabaseError> {
        self.state
            .try_lock()
            .map_err(|_| DatabaseError::TransactionBusy)
    }

    /// Rolls back to the earliest abandoned savepoint, which also discards
    /// every later one
    async fn settle(&self, state: &mut TxnState<T>) -> Result<(), DatabaseError> {
        let earliest = lock_abandoned(&self.abandoned)
            .iter()
            .min_by_key(|savepoint| savepoint.seq())
            .cloned();
        let (Some(savepoint), Some(tx)) = (earliest, state.tx.as_mut()) else {
            return Ok(());
        };

        tx.execute(&savepoint.rollback_sql())
            .await
            .map_err(|e| DatabaseError::savepoint(&savepoint, SavepointAction::RollbackTo, e))?;
        lock_abandoned(&self.abandoned).clear();
        Ok(())
    }

    /// Locks the transaction's connection for queries
    pub(crate) async fn connection(
        &self,
    ) -> Result<OwnedMappedMutexGuard<TxnState<T>, T::Target>, DatabaseError>
    where
        T: DerefMut,
    {
        let mut guard = Arc::clone(&self.state)
            .try_lock_owned()
            .map_err(|_| DatabaseError::TransactionBusy)?;
        self.settle(&mut guard).await?;
        OwnedMutexGuard::try_map(guard, |state| state.tx.as_deref_mut())
            .map_err(|_| DatabaseError::NoActiveTransaction)
    }
}

/// Marks a savepoint abandoned when dropped while still armed
pub(crate) struct SavepointGuard {
    abandoned: Abandoned,
    savepoint: Option<Savepoint>,
}

impl SavepointGuard {
    /// Call once the savepoint was released or rolled back to
    pub(crate) fn disarm(mut self) {
        self.savepoint = None;
    }
}

impl Drop for SavepointGuard {
    fn drop(&mut self) {
        if let Some(savepoint) = self.savepoint.take() {
            lock_abandoned(&self.abandoned).push(savepoint);
        }
    }
}

impl<T> fmt::Debug for TxnHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxnHandle").finish_non_exhaustive()
    }
}
