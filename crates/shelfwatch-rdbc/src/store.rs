//! The analytics store facade

use std::sync::Arc;
use tracing::info;

use crate::config::StoreConfig;
use crate::connection::ConnectionFactory;
use crate::error::Result;
use crate::events::{ShelfFillEvent, StoreEntrance};
use crate::manager::PoolManager;
use crate::pool::PoolStats;
use crate::query::QueryExecutor;
use crate::record::Batch;
use crate::retry::ResilientExecutor;
use crate::sanitize::ValueSanitizer;
use crate::transaction::TransactionHandle;
use crate::types::{ResultSet, Value};
use crate::writer::{BulkWriter, WriteMode, WriteResult, WriterStats};

struct Inner {
    config: StoreConfig,
    manager: Arc<PoolManager>,
    executor: ResilientExecutor,
    writer: BulkWriter,
    // keeps numeric zero: `void = 0` is a full shelf
    entrance_writer: BulkWriter,
    reader: QueryExecutor,
}

/// Entry point for every read and write.
///
/// Build one per process and clone it into every worker: clones share the
/// pool, the retry policy and the writer statistics.
#[derive(Clone)]
pub struct AnalyticsStore {
    inner: Arc<Inner>,
}

impl AnalyticsStore {
    /// Create a store over any connection factory.
    ///
    /// No connection is opened here; the pool is built on first use.
    pub fn new(config: StoreConfig, factory: Arc<dyn ConnectionFactory>) -> Result<Self> {
        let manager = Arc::new(PoolManager::new(config.pool.clone(), factory)?);
        let executor = ResilientExecutor::new(Arc::clone(&manager), config.retry.clone());
        let writer = BulkWriter::new(
            executor.clone(),
            ValueSanitizer::new(config.sanitize.clone()),
        );
        let entrance_writer = writer.clone().with_sanitizer(ValueSanitizer::new(
            config.sanitize.clone().with_zero_as_null(false),
        ));
        let reader = QueryExecutor::new(executor.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                manager,
                executor,
                writer,
                entrance_writer,
                reader,
            }),
        })
    }

    /// Create a store backed by PostgreSQL
    #[cfg(feature = "postgres")]
    pub fn connect_postgres(config: StoreConfig) -> Result<Self> {
        Self::new(config, Arc::new(crate::postgres::PgConnectionFactory))
    }

    /// Configuration the store was built with
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// The pool manager
    pub fn manager(&self) -> &Arc<PoolManager> {
        &self.inner.manager
    }

    /// The bulk writer
    pub fn writer(&self) -> &BulkWriter {
        &self.inner.writer
    }

    /// The query executor
    pub fn reader(&self) -> &QueryExecutor {
        &self.inner.reader
    }

    /// Write a batch in its own transaction, retrying connectivity failures
    pub async fn write(&self, mode: WriteMode, batch: &Batch) -> Result<WriteResult> {
        self.inner.writer.write(mode, batch).await
    }

    /// Write a batch inside a caller transaction
    pub async fn write_in(
        &self,
        tx: &TransactionHandle,
        mode: WriteMode,
        batch: &Batch,
    ) -> Result<WriteResult> {
        self.inner.writer.write_in(tx, mode, batch).await
    }

    /// Update existing rows, then insert the missing ones
    pub async fn update_then_insert(&self, batch: &Batch) -> Result<(WriteResult, WriteResult)> {
        self.inner.writer.update_then_insert(batch).await
    }

    /// Run a query and return the whole result set
    pub async fn query_table(&self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        self.inner.reader.query_table(sql, params).await
    }

    /// Run a query and return its first value
    pub async fn query_scalar(&self, sql: &str, params: &[Value]) -> Result<Value> {
        self.inner.reader.query_scalar(sql, params).await
    }

    /// Run a statement that returns no rows
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.inner.reader.execute(sql, params).await
    }

    /// Reserve a connection and open a transaction on it.
    ///
    /// Acquiring the connection is retried like any other operation.
    pub async fn begin_transaction(&self) -> Result<TransactionHandle> {
        let conn = self.inner.executor.acquire().await?;
        TransactionHandle::begin(conn).await
    }

    /// Append shelf fill measurements.
    ///
    /// Use [`WriteMode::Insert`] for a plain append, or
    /// [`WriteMode::Upsert`] to overwrite a measurement with the same
    /// `(store_id, ts)`.
    pub async fn append_fill_events(
        &self,
        events: &[ShelfFillEvent],
        mode: WriteMode,
    ) -> Result<WriteResult> {
        self.write(mode, &ShelfFillEvent::batch(events)).await
    }

    /// Append one store entrance snapshot.
    ///
    /// Null markers are still collapsed, but a `void` of zero is written
    /// as zero.
    pub async fn append_entrance(&self, entrance: &StoreEntrance) -> Result<WriteResult> {
        self.inner
            .entrance_writer
            .write(WriteMode::Insert, &StoreEntrance::batch([entrance]))
            .await
    }

    /// Statistics of the current pool, if one is built
    pub async fn pool_stats(&self) -> Option<PoolStats> {
        use crate::pool::ConnectionPool;

        let pool = self.inner.manager.current().await?;
        Some(pool.stats())
    }

    /// Writer statistics
    pub fn writer_stats(&self) -> WriterStats {
        self.inner.writer.stats()
    }

    /// Dispose the pool. A later call builds a fresh one.
    pub async fn close(&self) -> Result<()> {
        info!("Closing analytics store");
        self.inner.manager.close().await
    }
}

impl std::fmt::Debug for AnalyticsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsStore")
            .field("manager", &self.inner.manager)
            .field("retry", &self.inner.config.retry)
            .field("writer", &self.inner.writer)
            .finish()
    }
}
