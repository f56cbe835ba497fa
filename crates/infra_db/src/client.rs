//! Driver seams and the transaction-aware query client
//!
//! [`RelationalPool`] and [`RelationalTx`] describe the handful of driver
//! operations the unit-of-work machinery needs. They are implemented for the
//! sqlx PostgreSQL pool here and for the in-memory recording backend in
//! [`crate::mock`].
//!
//! A [`Client`] is what repositories receive from
//! [`Connection::read_client`](crate::Connection::read_client) and
//! [`Connection::write_client`](crate::Connection::write_client): either a plain
//! pool or the active transaction. Both are used the same way:
//!
//! ```rust,ignore
//! let mut conn = connection.write_client(&ctx).acquire().await?;
//! sqlx::query("DELETE FROM pages WHERE id = $1")
//!     .bind(id)
//!     .execute(&mut *conn)
//!     .await?;
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnection, PgPool, Postgres};
use tokio::sync::OwnedMappedMutexGuard;

use crate::error::DatabaseError;
use crate::txn::{TxnHandle, TxnState};

/// An open database transaction
#[async_trait]
pub trait RelationalTx: Send + Sized + 'static {
    /// Runs a statement that returns no rows
    async fn execute(&mut self, statement: &str) -> Result<(), DatabaseError>;

    async fn commit(self) -> Result<(), DatabaseError>;

    async fn rollback(self) -> Result<(), DatabaseError>;
}

/// A pool of database connections
#[async_trait]
pub trait RelationalPool: Clone + Send + Sync + 'static {
    /// The connection type queries run against
    type Connection: Send + 'static;

    /// A connection checked out of the pool in autocommit mode
    type Pooled: DerefMut<Target = Self::Connection> + Send;

    /// A connection checked out of the pool inside an open transaction
    type Tx: RelationalTx + DerefMut<Target = Self::Connection>;

    async fn acquire(&self) -> Result<Self::Pooled, DatabaseError>;

    async fn begin(&self) -> Result<Self::Tx, DatabaseError>;

    /// Round-trips a trivial statement
    async fn ping(&self) -> Result<(), DatabaseError>;

    /// Waits for checked-out connections to return, then closes all of them
    async fn close(&self) -> Result<(), DatabaseError>;
}

#[async_trait]
impl RelationalTx for sqlx::Transaction<'static, Postgres> {
    async fn execute(&mut self, statement: &str) -> Result<(), DatabaseError> {
        let conn: &mut PgConnection = self;
        sqlx::Executor::execute(conn, sqlx::raw_sql(statement))
            .await
            .map_err(DatabaseError::classify)?;
        Ok(())
    }

    async fn commit(self) -> Result<(), DatabaseError> {
        sqlx::Transaction::commit(self)
            .await
            .map_err(DatabaseError::classify)
    }

    async fn rollback(self) -> Result<(), DatabaseError> {
        sqlx::Transaction::rollback(self)
            .await
            .map_err(DatabaseError::classify)
    }
}

#[async_trait]
impl RelationalPool for PgPool {
    type Connection = PgConnection;
    type Pooled = PoolConnection<Postgres>;
    type Tx = sqlx::Transaction<'static, Postgres>;

    async fn acquire(&self) -> Result<Self::Pooled, DatabaseError> {
        sqlx::Pool::acquire(self)
            .await
            .map_err(DatabaseError::classify)
    }

    async fn begin(&self) -> Result<Self::Tx, DatabaseError> {
        sqlx::Pool::begin(self).await.map_err(DatabaseError::classify)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::raw_sql("SELECT 1")
            .execute(self)
            .await
            .map_err(DatabaseError::classify)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        sqlx::Pool::close(self).await;
        Ok(())
    }
}

/// Query target handed to repositories: a pool, or the active transaction
pub enum Client<P: RelationalPool> {
    Pool(P),
    Transaction(Arc<TxnHandle<P::Tx>>),
}

impl<P: RelationalPool> Client<P> {
    /// Returns true if queries run inside a transaction
    pub fn is_transaction(&self) -> bool {
        matches!(self, Client::Transaction(_))
    }

    /// Returns true if both clients are bound to the very same transaction
    pub fn same_transaction(&self, other: &Self) -> bool {
        match (self, other) {
            (Client::Transaction(a), Client::Transaction(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Checks out a connection to run queries on
    ///
    /// For a transaction this locks the transaction's connection until the
    /// returned value is dropped. While it is held, nested units of work,
    /// other checkouts and the final commit on the same transaction fail
    /// instead of waiting.
    ///
    /// # Errors
    ///
    /// `DatabaseError::NoActiveTransaction` if the transaction has already been
    /// committed or rolled back, and `DatabaseError::TransactionBusy` if a
    /// connection to it is already checked out.
    pub async fn acquire(&self) -> Result<ClientConn<P>, DatabaseError> {
        let inner = match self {
            Client::Pool(pool) => ConnInner::Pooled(pool.acquire().await?),
            Client::Transaction(handle) => ConnInner::Transaction(handle.connection().await?),
        };
        Ok(ClientConn { inner })
    }
}

impl<P: RelationalPool> Clone for Client<P> {
    fn clone(&self) -> Self {
        match self {
            Client::Pool(pool) => Client::Pool(pool.clone()),
            Client::Transaction(handle) => Client::Transaction(Arc::clone(handle)),
        }
    }
}

impl<P: RelationalPool> fmt::Debug for Client<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Client::Pool(_) => f.write_str("Client::Pool"),
            Client::Transaction(_) => f.write_str("Client::Transaction"),
        }
    }
}

/// A checked-out connection; dereferences to the driver connection
pub struct ClientConn<P: RelationalPool> {
    inner: ConnInner<P>,
}

enum ConnInner<P: RelationalPool> {
    Pooled(P::Pooled),
    Transaction(OwnedMappedMutexGuard<TxnState<P::Tx>, P::Connection>),
}

impl<P: RelationalPool> ClientConn<P> {
    pub fn is_transaction(&self) -> bool {
        matches!(self.inner, ConnInner::Transaction(_))
    }
}

impl<P: RelationalPool> Deref for ClientConn<P> {
    type Target = P::Connection;

    fn deref(&self) -> &Self::Target {
        match &self.inner {
            ConnInner::Pooled(conn) => &**conn,
            ConnInner::Transaction(guard) => &**guard,
        }
    }
}

impl<P: RelationalPool> DerefMut for ClientConn<P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.inner {
            ConnInner::Pooled(conn) => &mut **conn,
            ConnInner::Transaction(guard) => &mut **guard,
        }
    }
}

impl<P: RelationalPool> fmt::Debug for ClientConn<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConn")
            .field("transaction", &self.is_transaction())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPool;

    #[tokio::test]
    async fn test_pool_client_runs_in_autocommit() {
        let pool = MockPool::new("write");
        let client: Client<MockPool> = Client::Pool(pool.clone());

        let mut conn = client.acquire().await.unwrap();
        assert!(!conn.is_transaction());
        conn.execute_sql("INSERT a").unwrap();
        drop(conn);

        assert!(!client.is_transaction());
        assert_eq!(pool.committed_rows(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_same_transaction() {
        let pool = MockPool::new("write");
        let handle = Arc::new(TxnHandle::new(pool.begin().await.unwrap()));
        let other = Arc::new(TxnHandle::new(pool.begin().await.unwrap()));

        let a: Client<MockPool> = Client::Transaction(Arc::clone(&handle));
        let b = a.clone();
        let c: Client<MockPool> = Client::Transaction(other);

        assert!(a.is_transaction());
        assert!(a.same_transaction(&b));
        assert!(!a.same_transaction(&c));
        assert!(!a.same_transaction(&Client::Pool(pool)));
    }

    #[tokio::test]
    async fn test_finished_transaction_cannot_be_acquired() {
        let pool = MockPool::new("write");
        let handle = Arc::new(TxnHandle::new(pool.begin().await.unwrap()));
        let client: Client<MockPool> = Client::Transaction(Arc::clone(&handle));

        handle.commit().await.unwrap();

        let err = client.acquire().await.unwrap_err();
        assert!(matches!(err, DatabaseError::NoActiveTransaction));
    }
}
