//! Read/write pool pair and the unit-of-work orchestrator
//!
//! A [`Connection`] owns two pools: reads go to the read pool and writes to the
//! write pool, except while a transaction is bound to the request context, in
//! which case both go to that transaction so a unit of work sees its own
//! writes.
//!
//! [`TransactionService::run_in_transaction`] is implemented here. The
//! outermost call begins a transaction on the write pool and binds it to a
//! derived context; any call made with that context opens a savepoint instead.
//! Each level ends in exactly one of commit/release (closure succeeded) or
//! rollback/rollback-to-savepoint (closure failed or panicked).

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use sqlx::PgPool;
use tracing::info;

use core_kernel::{Context, TransactionError, TransactionService};

use crate::client::{Client, RelationalPool, RelationalTx};
use crate::context::{bind_transaction, lookup_transaction};
use crate::error::DatabaseError;
use crate::pool::{create_pool, DbPool, PoolConfig, PoolRole};
use crate::txn::TxnHandle;

/// The process-wide pool pair
///
/// Shared by reference (usually in an `Arc`) for the whole process lifetime.
#[derive(Debug, Clone)]
pub struct Connection<P: RelationalPool = PgPool> {
    read: DbPool<P>,
    write: DbPool<P>,
}

impl Connection<PgPool> {
    /// Creates both PostgreSQL pools and checks that each server answers
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let write = PoolConfig::new(&settings.write_url);
    /// let read = write.with_url(&settings.read_url);
    /// let connection = Connection::connect(&read, &write).await?;
    /// ```
    pub async fn connect(read: &PoolConfig, write: &PoolConfig) -> Result<Self, DatabaseError> {
        let read_pool = create_pool(read).await?;
        let write_pool = create_pool(write).await?;
        Self::from_pools(read_pool, write_pool).await
    }
}

impl<P: RelationalPool> Connection<P> {
    /// Wraps already-built pools, pinging both
    pub async fn from_pools(read: P, write: P) -> Result<Self, DatabaseError> {
        let read = DbPool::new(PoolRole::Read, read);
        let write = DbPool::new(PoolRole::Write, write);

        read.ping().await?;
        write.ping().await?;

        info!("Database connection established");
        Ok(Self { read, write })
    }

    /// Client for queries that only read
    pub fn read_client(&self, ctx: &Context) -> Client<P> {
        self.client_for(ctx, &self.read)
    }

    /// Client for queries that write
    pub fn write_client(&self, ctx: &Context) -> Client<P> {
        self.client_for(ctx, &self.write)
    }

    fn client_for(&self, ctx: &Context, pool: &DbPool<P>) -> Client<P> {
        match lookup_transaction::<P::Tx>(ctx) {
            Some(handle) => Client::Transaction(handle),
            None => Client::Pool(pool.client().clone()),
        }
    }

    /// Pings the read pool
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        self.read.ping().await
    }

    /// Closes both pools
    ///
    /// The write pool is closed even if closing the read pool failed. If both
    /// fail, the returned error reports both.
    pub async fn close(&self) -> Result<(), DatabaseError> {
        let read = self.read.close().await;
        let write = self.write.close().await;

        let result = match (read, write) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(read), Err(write)) => Err(DatabaseError::CloseFailed(format!(
                "{}; {}",
                read, write
            ))),
        };

        info!(ok = result.is_ok(), "Database connection closed");
        result
    }

    async fn run_outermost<T, E, F, Fut>(
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
        let tx = self
            .write
            .client()
            .begin()
            .await
            .map_err(TransactionError::begin)?;
        let handle = Arc::new(TxnHandle::new(tx));
        let txn_ctx = bind_transaction(ctx, Arc::clone(&handle));

        let outcome = AssertUnwindSafe(async move { f(txn_ctx).await })
            .catch_unwind()
            .await;

        match outcome {
            Err(payload) => {
                let _ = handle.rollback().await;
                panic::resume_unwind(payload)
            }
            Ok(Err(source)) => match handle.rollback().await {
                Ok(()) => Err(TransactionError::Aborted(source)),
                Err(rollback) => Err(TransactionError::RollbackFailed {
                    source,
                    rollback: rollback.into(),
                }),
            },
            Ok(Ok(value)) => {
                handle.commit().await.map_err(TransactionError::commit)?;
                Ok(value)
            }
        }
    }
}

async fn run_nested<Tx, T, E, F, Fut>(
    handle: Arc<TxnHandle<Tx>>,
    ctx: &Context,
    f: F,
) -> Result<T, TransactionError<E>>
where
    Tx: RelationalTx,
    F: FnOnce(Context) -> Fut + Send,
    Fut: Future<Output = Result<T, E>> + Send,
    T: Send,
    E: Send,
{
    let savepoint = handle
        .begin_savepoint()
        .await
        .map_err(TransactionError::begin)?;
    // Dropping this future before the savepoint is settled leaves the guard
    // armed, and the handle rolls back to the savepoint on its next use.
    let guard = handle.guard(&savepoint);

    let nested_ctx = ctx.clone();
    let outcome = AssertUnwindSafe(async move { f(nested_ctx).await })
        .catch_unwind()
        .await;

    match outcome {
        Err(payload) => {
            let _ = handle.rollback_to_savepoint(&savepoint).await;
            guard.disarm();
            panic::resume_unwind(payload)
        }
        Ok(Err(source)) => {
            let rolled_back = handle.rollback_to_savepoint(&savepoint).await;
            guard.disarm();
            match rolled_back {
                Ok(()) => Err(TransactionError::Aborted(source)),
                Err(rollback) => Err(TransactionError::RollbackFailed {
                    source,
                    rollback: rollback.into(),
                }),
            }
        }
        Ok(Ok(value)) => {
            let released = handle.release_savepoint(&savepoint).await;
            guard.disarm();
            released.map_err(TransactionError::release)?;
            Ok(value)
        }
    }
}

#[async_trait]
impl<P: RelationalPool> TransactionService for Connection<P> {
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
        match lookup_transaction::<P::Tx>(ctx) {
            Some(handle) => run_nested(handle, ctx, f).await,
            None => self.run_outermost(ctx, f).await,
        }
    }
}
