//! In-memory recording backend
//!
//! [`MockPool`] implements [`RelationalPool`] without a server. Every statement
//! is appended to a shared journal, tagged with the label of the pool that ran
//! it, and a tiny row store emulates autocommit, transactions and savepoints:
//!
//! - `INSERT <row>` adds `<row>`, to the committed rows in autocommit mode or to
//!   the transaction's pending rows otherwise
//! - `SAVEPOINT`, `ROLLBACK TO SAVEPOINT` and `RELEASE SAVEPOINT` behave as in
//!   PostgreSQL, including the error for an unknown savepoint name
//! - `COMMIT` publishes the pending rows; `ROLLBACK` or dropping the
//!   transaction discards them
//!
//! Failures are injected per statement with [`MockPool::fail_statement`], which
//! matches either the bare statement or its labelled journal form
//! (`"read: CLOSE"`).

use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::client::{RelationalPool, RelationalTx};
use crate::error::DatabaseError;

#[derive(Debug, Default)]
struct Store {
    rows: Vec<String>,
    journal: Vec<String>,
    failures: HashSet<String>,
}

impl Store {
    /// Journals `statement` and fails it if a failure was injected for it
    fn record(&mut self, label: &str, statement: &str) -> Result<(), DatabaseError> {
        let entry = format!("{label}: {statement}");
        let fail = self.failures.contains(statement) || self.failures.contains(&entry);
        self.journal.push(entry);
        if fail {
            return Err(DatabaseError::QueryFailed(format!(
                "injected failure: {statement}"
            )));
        }
        Ok(())
    }
}

fn lock(store: &Mutex<Store>) -> MutexGuard<'_, Store> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A pool backed by an in-memory row store
#[derive(Debug, Clone)]
pub struct MockPool {
    label: &'static str,
    store: Arc<Mutex<Store>>,
}

impl MockPool {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            store: Arc::default(),
        }
    }

    /// Another pool over the same rows and journal, like a replica
    pub fn replica(&self, label: &'static str) -> Self {
        Self {
            label,
            store: Arc::clone(&self.store),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Makes every later execution of `statement` fail
    pub fn fail_statement(&self, statement: impl Into<String>) {
        lock(&self.store).failures.insert(statement.into());
    }

    pub fn clear_failures(&self) {
        lock(&self.store).failures.clear();
    }

    /// Every statement run so far, as `"<label>: <statement>"`
    pub fn journal(&self) -> Vec<String> {
        lock(&self.store).journal.clone()
    }

    /// Number of journal entries equal to `entry`
    pub fn count(&self, entry: &str) -> usize {
        lock(&self.store).journal.iter().filter(|e| *e == entry).count()
    }

    pub fn committed_rows(&self) -> Vec<String> {
        lock(&self.store).rows.clone()
    }

    fn connection(&self, pending: Option<Vec<String>>) -> MockConn {
        MockConn {
            label: self.label,
            store: Arc::clone(&self.store),
            pending,
            savepoints: Vec::new(),
        }
    }
}

/// A connection to the in-memory store
#[derive(Debug)]
pub struct MockConn {
    label: &'static str,
    store: Arc<Mutex<Store>>,
    /// Rows written by the open transaction; `None` in autocommit mode
    pending: Option<Vec<String>>,
    /// Open savepoints with the number of pending rows when each was taken
    savepoints: Vec<(String, usize)>,
}

impl MockConn {
    /// Label of the pool this connection came from
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Returns true while a transaction is open on this connection
    pub fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }

    /// Rows visible to this connection: committed rows plus its own pending ones
    pub fn rows(&self) -> Vec<String> {
        let mut rows = lock(&self.store).rows.clone();
        if let Some(pending) = &self.pending {
            rows.extend(pending.iter().cloned());
        }
        rows
    }

    /// Runs one statement
    pub fn execute_sql(&mut self, statement: &str) -> Result<(), DatabaseError> {
        lock(&self.store).record(self.label, statement)?;

        if let Some(row) = statement.strip_prefix("INSERT ") {
            match &mut self.pending {
                Some(pending) => pending.push(row.to_string()),
                None => lock(&self.store).rows.push(row.to_string()),
            }
        } else if let Some(name) = statement.strip_prefix("SAVEPOINT ") {
            let pending = self.pending.as_ref().ok_or_else(outside_transaction)?;
            self.savepoints.push((name.to_string(), pending.len()));
        } else if let Some(name) = statement.strip_prefix("ROLLBACK TO SAVEPOINT ") {
            let index = self.savepoint_index(name)?;
            let mark = self.savepoints[index].1;
            self.savepoints.truncate(index + 1);
            if let Some(pending) = &mut self.pending {
                pending.truncate(mark);
            }
        } else if let Some(name) = statement.strip_prefix("RELEASE SAVEPOINT ") {
            let index = self.savepoint_index(name)?;
            self.savepoints.truncate(index);
        }

        Ok(())
    }

    fn savepoint_index(&self, name: &str) -> Result<usize, DatabaseError> {
        self.savepoints
            .iter()
            .rposition(|(open, _)| open == name)
            .ok_or_else(|| DatabaseError::QueryFailed(format!("savepoint \"{name}\" does not exist")))
    }

    fn finish(&mut self, statement: &str, publish: bool) -> Result<(), DatabaseError> {
        let mut store = lock(&self.store);
        store.record(self.label, statement)?;
        let pending = self.pending.take().unwrap_or_default();
        if publish {
            store.rows.extend(pending);
        }
        self.savepoints.clear();
        Ok(())
    }
}

fn outside_transaction() -> DatabaseError {
    DatabaseError::QueryFailed("SAVEPOINT can only be used in transaction blocks".to_string())
}

/// An open transaction on a [`MockConn`]
#[derive(Debug)]
pub struct MockTx {
    conn: MockConn,
}

impl Deref for MockTx {
    type Target = MockConn;

    fn deref(&self) -> &MockConn {
        &self.conn
    }
}

impl DerefMut for MockTx {
    fn deref_mut(&mut self) -> &mut MockConn {
        &mut self.conn
    }
}

#[async_trait]
impl RelationalTx for MockTx {
    async fn execute(&mut self, statement: &str) -> Result<(), DatabaseError> {
        self.conn.execute_sql(statement)
    }

    async fn commit(mut self) -> Result<(), DatabaseError> {
        self.conn.finish("COMMIT", true)
    }

    async fn rollback(mut self) -> Result<(), DatabaseError> {
        self.conn.finish("ROLLBACK", false)
    }
}

#[async_trait]
impl RelationalPool for MockPool {
    type Connection = MockConn;
    type Pooled = Box<MockConn>;
    type Tx = MockTx;

    async fn acquire(&self) -> Result<Self::Pooled, DatabaseError> {
        Ok(Box::new(self.connection(None)))
    }

    async fn begin(&self) -> Result<Self::Tx, DatabaseError> {
        lock(&self.store).record(self.label, "BEGIN")?;
        Ok(MockTx {
            conn: self.connection(Some(Vec::new())),
        })
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        lock(&self.store).record(self.label, "SELECT 1")
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        lock(&self.store).record(self.label, "CLOSE")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_autocommit_writes_are_visible_everywhere() {
        let write = MockPool::new("write");
        let read = write.replica("read");

        write.acquire().await.unwrap().execute_sql("INSERT a").unwrap();

        let conn = read.acquire().await.unwrap();
        assert_eq!(conn.rows(), vec!["a"]);
        assert_eq!(conn.label(), "read");
        assert!(!conn.in_transaction());
    }

    #[tokio::test]
    async fn test_pending_rows_are_private_to_the_transaction() {
        let write = MockPool::new("write");
        let mut tx = write.begin().await.unwrap();
        tx.execute("INSERT a").await.unwrap();

        assert_eq!(tx.rows(), vec!["a"]);
        assert!(write.acquire().await.unwrap().rows().is_empty());

        tx.commit().await.unwrap();
        assert_eq!(write.committed_rows(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_unknown_savepoint_is_an_error() {
        let write = MockPool::new("write");
        let mut tx = write.begin().await.unwrap();

        assert!(tx.execute("RELEASE SAVEPOINT sp_0009").await.is_err());
        assert!(write
            .acquire()
            .await
            .unwrap()
            .execute_sql("SAVEPOINT sp_0001")
            .is_err());
    }

    #[tokio::test]
    async fn test_injected_failure_matches_label() {
        let write = MockPool::new("write");
        let read = write.replica("read");
        write.fail_statement("read: CLOSE");

        assert!(read.close().await.is_err());
        assert!(write.close().await.is_ok());
        assert_eq!(write.journal(), vec!["read: CLOSE", "write: CLOSE"]);
    }
}
