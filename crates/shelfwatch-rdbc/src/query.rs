//! Read path and ad-hoc statements
//!
//! Results come back as the database returned them: no sanitization is
//! applied on the way out.

use crate::connection::Connection;
use crate::error::Result;
use crate::retry::ResilientExecutor;
use crate::transaction::TransactionHandle;
use crate::types::{ResultSet, Value};

/// Runs parameterized SQL through the resilient executor
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    executor: ResilientExecutor,
}

impl QueryExecutor {
    /// Create a query executor
    pub fn new(executor: ResilientExecutor) -> Self {
        Self { executor }
    }

    /// Run a query and return the whole result set.
    ///
    /// Parameters are positional (`$1`, `$2`, ...).
    pub async fn query_table(&self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        self.executor
            .run("query", move |conn| async move { conn.query(sql, params).await })
            .await
    }

    /// First column of the first row, or `Null` when there are no rows
    pub async fn query_scalar(&self, sql: &str, params: &[Value]) -> Result<Value> {
        let rows = self.query_table(sql, params).await?;
        Ok(rows.scalar().cloned().unwrap_or(Value::Null))
    }

    /// Run a statement that returns no rows (DDL, ad-hoc DML).
    ///
    /// Runs in autocommit mode, so it is committed once it returns `Ok`.
    /// Returns the affected row count.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.executor
            .run("execute", move |conn| async move {
                conn.execute(sql, params).await
            })
            .await
    }

    /// Run a query inside a caller transaction (not retried)
    pub async fn query_in(
        &self,
        tx: &TransactionHandle,
        sql: &str,
        params: &[Value],
    ) -> Result<ResultSet> {
        tx.query(sql, params).await
    }

    /// Run a statement inside a caller transaction (not retried)
    pub async fn execute_in(
        &self,
        tx: &TransactionHandle,
        sql: &str,
        params: &[Value],
    ) -> Result<u64> {
        tx.execute(sql, params).await
    }
}
