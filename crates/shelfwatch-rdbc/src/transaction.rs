//! Caller-managed transactions

use tracing::{debug, warn};

use crate::connection::{Connection, Transaction};
use crate::error::{Error, Result};
use crate::pool::PooledConnection;
use crate::types::{ResultSet, Value};

/// An open transaction on a connection reserved for the caller.
///
/// Several writes and queries can share one handle and land atomically.
/// Nothing run through a handle is retried; after a failed statement the
/// backend transaction is aborted and only `rollback` makes sense.
///
/// Dropping a handle without `commit` or `rollback` rolls back in the
/// background before the connection goes back to the pool.
pub struct TransactionHandle {
    tx: Option<Box<dyn Transaction>>,
    conn: Option<PooledConnection>,
}

impl TransactionHandle {
    /// Open a transaction on `conn`
    pub async fn begin(conn: PooledConnection) -> Result<Self> {
        let tx = conn.begin().await?;
        debug!(generation = conn.generation(), "Transaction opened");
        Ok(Self {
            tx: Some(tx),
            conn: Some(conn),
        })
    }

    /// Generation of the pool the connection came from
    pub fn generation(&self) -> Option<u64> {
        self.conn.as_ref().map(PooledConnection::generation)
    }

    fn tx(&self) -> Result<&dyn Transaction> {
        self.tx
            .as_deref()
            .ok_or_else(|| Error::transaction("transaction already finished"))
    }

    /// Run a query inside the transaction
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        self.tx()?.query(sql, params).await
    }

    /// Run a statement inside the transaction
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.tx()?.execute(sql, params).await
    }

    /// Run a statement once per parameter row inside the transaction
    pub async fn execute_many(&self, sql: &str, rows: &[Vec<Value>]) -> Result<u64> {
        self.tx()?.execute_many(sql, rows).await
    }

    /// Commit and release the connection
    pub async fn commit(mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::transaction("transaction already finished"))?;
        let result = tx.commit().await;
        if result.is_err() {
            self.mark_broken();
        }
        result
    }

    /// Roll back and release the connection
    pub async fn rollback(mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::transaction("transaction already finished"))?;
        let result = tx.rollback().await;
        if result.is_err() {
            self.mark_broken();
        }
        result
    }

    fn mark_broken(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            conn.mark_broken();
        }
    }
}

impl Drop for TransactionHandle {
    fn drop(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let mut conn = self.conn.take();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = tx.rollback().await {
                        warn!(error = %e, "Rollback of abandoned transaction failed");
                        if let Some(conn) = conn.as_mut() {
                            conn.mark_broken();
                        }
                    }
                    drop(conn);
                });
            }
            Err(_) => {
                if let Some(conn) = conn.as_mut() {
                    conn.mark_broken();
                }
            }
        }
    }
}

impl std::fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("open", &self.tx.is_some())
            .field("conn", &self.conn)
            .finish()
    }
}
