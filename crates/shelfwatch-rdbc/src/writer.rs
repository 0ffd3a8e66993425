//! Bulk writer: sanitize, build one statement, run it for every record.
//!
//! Every write goes through the same pipeline regardless of mode:
//!
//! 1. the batch is copied and sanitized ([`ValueSanitizer`])
//! 2. the batch invariants are checked ([`Batch::validate`])
//! 3. the dialect builds one statement for the mode
//! 4. the statement is prepared once and executed for each record
//!
//! Without a caller transaction the writer draws its own connection from
//! the resilient executor, wraps the batch in `BEGIN`/`COMMIT` and retries
//! connectivity failures as a whole. With a [`TransactionHandle`] it only
//! executes: the caller commits, rolls back and deals with failures.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::dialect::{PostgresDialect, SqlDialect};
use crate::error::Result;
use crate::pool::PooledConnection;
use crate::record::Batch;
use crate::retry::ResilientExecutor;
use crate::sanitize::ValueSanitizer;
use crate::transaction::TransactionHandle;
use crate::types::Value;

/// Write strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WriteMode {
    /// Insert, or overwrite the non-key columns on conflict-key collision
    #[default]
    Upsert,
    /// Insert only rows whose conflict key is not present yet
    InsertIfAbsent,
    /// Update existing rows matched by conflict key; never inserts
    UpdateOnly,
    /// Unconditional insert (a duplicate key is an integrity error)
    Insert,
}

impl WriteMode {
    /// All modes
    pub const ALL: [WriteMode; 4] = [
        WriteMode::Upsert,
        WriteMode::InsertIfAbsent,
        WriteMode::UpdateOnly,
        WriteMode::Insert,
    ];

    /// Short name used in logs
    pub const fn as_str(self) -> &'static str {
        match self {
            WriteMode::Upsert => "upsert",
            WriteMode::InsertIfAbsent => "insert_if_absent",
            WriteMode::UpdateOnly => "update_only",
            WriteMode::Insert => "insert",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one write call
#[derive(Debug, Clone, PartialEq)]
pub struct WriteResult {
    /// Mode the batch was written with
    pub mode: WriteMode,
    /// Records submitted
    pub records: usize,
    /// Rows the backend reported as affected
    pub rows_affected: u64,
    /// Wall time of the call, retries included
    pub elapsed: Duration,
}

impl WriteResult {
    fn new(mode: WriteMode, records: usize, rows_affected: u64, elapsed: Duration) -> Self {
        Self {
            mode,
            records,
            rows_affected,
            elapsed,
        }
    }

    /// Whether any row was written.
    ///
    /// For [`WriteMode::InsertIfAbsent`] this answers "was the key new".
    #[inline]
    pub fn inserted(&self) -> bool {
        self.rows_affected > 0
    }
}

/// Writer statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriterStats {
    /// Batches written successfully
    pub batches_written: u64,
    /// Records in successful batches
    pub records_written: u64,
    /// Rows affected by successful batches
    pub rows_affected: u64,
    /// Batches that ended in an error
    pub batches_failed: u64,
    /// Total write duration (milliseconds)
    pub total_write_time_ms: u64,
}

/// Atomic writer statistics
#[derive(Debug, Default)]
#[allow(missing_docs)]
pub struct AtomicWriterStats {
    pub batches_written: AtomicU64,
    pub records_written: AtomicU64,
    pub rows_affected: AtomicU64,
    pub batches_failed: AtomicU64,
    pub total_write_time_ms: AtomicU64,
}

impl AtomicWriterStats {
    /// Record a successful batch
    pub fn record_batch(&self, result: &WriteResult) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.records_written
            .fetch_add(result.records as u64, Ordering::Relaxed);
        self.rows_affected
            .fetch_add(result.rows_affected, Ordering::Relaxed);
        self.total_write_time_ms
            .fetch_add(result.elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record a failed batch
    pub fn record_failure(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot
    pub fn snapshot(&self) -> WriterStats {
        WriterStats {
            batches_written: self.batches_written.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            rows_affected: self.rows_affected.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            total_write_time_ms: self.total_write_time_ms.load(Ordering::Relaxed),
        }
    }
}

/// A statement with one parameter row per record
struct Prepared {
    sql: String,
    rows: Vec<Vec<Value>>,
}

/// Writes batches in any [`WriteMode`]
#[derive(Clone)]
pub struct BulkWriter {
    executor: ResilientExecutor,
    dialect: Arc<dyn SqlDialect>,
    sanitizer: ValueSanitizer,
    stats: Arc<AtomicWriterStats>,
}

impl BulkWriter {
    /// Create a PostgreSQL writer
    pub fn new(executor: ResilientExecutor, sanitizer: ValueSanitizer) -> Self {
        Self {
            executor,
            dialect: Arc::new(PostgresDialect),
            sanitizer,
            stats: Arc::new(AtomicWriterStats::default()),
        }
    }

    /// Use another statement dialect
    pub fn with_dialect(mut self, dialect: Arc<dyn SqlDialect>) -> Self {
        self.dialect = dialect;
        self
    }

    /// Use another sanitizer. Statistics stay shared with `self`.
    pub fn with_sanitizer(mut self, sanitizer: ValueSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// The sanitizer applied to every batch
    pub fn sanitizer(&self) -> &ValueSanitizer {
        &self.sanitizer
    }

    /// Statistics snapshot
    pub fn stats(&self) -> WriterStats {
        self.stats.snapshot()
    }

    /// Write a batch on a connection of the writer's own.
    ///
    /// The whole batch commits or none of it does. Connectivity failures
    /// are retried per the executor's policy; anything else, integrity
    /// violations included, is returned at once. An empty batch is checked
    /// and then reported as written without touching the database.
    pub async fn write(&self, mode: WriteMode, batch: &Batch) -> Result<WriteResult> {
        let start = Instant::now();
        let Some(prepared) = self.prepare(mode, batch)? else {
            return Ok(WriteResult::new(mode, 0, 0, start.elapsed()));
        };

        let label = format!("{} {}", mode, batch.table());
        let statements = std::slice::from_ref(&prepared);
        let outcome = self
            .executor
            .run(&label, move |conn| write_owned(conn, statements))
            .await
            .map(|counts| counts.iter().sum());

        self.finish(mode, batch, start, outcome)
    }

    /// Write a batch inside a caller transaction.
    ///
    /// Nothing is committed and nothing is retried: a failed statement
    /// aborts the caller's transaction, so the caller decides what to do.
    pub async fn write_in(
        &self,
        tx: &TransactionHandle,
        mode: WriteMode,
        batch: &Batch,
    ) -> Result<WriteResult> {
        let start = Instant::now();
        let Some(prepared) = self.prepare(mode, batch)? else {
            return Ok(WriteResult::new(mode, 0, 0, start.elapsed()));
        };

        let outcome = tx.execute_many(&prepared.sql, &prepared.rows).await;
        self.finish(mode, batch, start, outcome)
    }

    /// Refresh the rows that exist, then insert the ones that do not.
    ///
    /// Runs [`WriteMode::UpdateOnly`] and [`WriteMode::InsertIfAbsent`] with
    /// the same batch in one transaction, so it works on tables without a
    /// unique constraint on the conflict key. Both results carry the elapsed
    /// time of the whole call.
    pub async fn update_then_insert(&self, batch: &Batch) -> Result<(WriteResult, WriteResult)> {
        let start = Instant::now();
        let update = self.prepare(WriteMode::UpdateOnly, batch)?;
        let insert = self.prepare(WriteMode::InsertIfAbsent, batch)?;
        let (Some(update), Some(insert)) = (update, insert) else {
            let elapsed = start.elapsed();
            return Ok((
                WriteResult::new(WriteMode::UpdateOnly, 0, 0, elapsed),
                WriteResult::new(WriteMode::InsertIfAbsent, 0, 0, elapsed),
            ));
        };

        let label = format!("update_then_insert {}", batch.table());
        let statements = [update, insert];
        let statements = &statements[..];
        let counts = match self
            .executor
            .run(&label, move |conn| write_owned(conn, statements))
            .await
        {
            Ok(counts) => counts,
            Err(e) => {
                self.stats.record_failure();
                warn!(
                    table = batch.table(),
                    mode = "update_then_insert",
                    category = %e.category(),
                    error = %e,
                    "Batch write failed"
                );
                return Err(e);
            }
        };

        let elapsed = start.elapsed();
        let updated = counts.first().copied().unwrap_or(0);
        let inserted = counts.get(1).copied().unwrap_or(0);
        let update = WriteResult::new(WriteMode::UpdateOnly, batch.len(), updated, elapsed);
        let insert = WriteResult::new(WriteMode::InsertIfAbsent, batch.len(), inserted, elapsed);
        self.stats.record_batch(&update);
        self.stats.record_batch(&insert);
        debug!(
            table = batch.table(),
            records = batch.len(),
            updated,
            inserted,
            elapsed_ms = elapsed.as_millis() as u64,
            "Batch merged"
        );
        Ok((update, insert))
    }

    /// Sanitize, validate and build the statement. `None` for an empty batch.
    fn prepare(&self, mode: WriteMode, batch: &Batch) -> Result<Option<Prepared>> {
        let batch = self.sanitizer.sanitized(batch);
        batch.validate()?;
        let sql = self.dialect.write_sql(mode, &batch)?;
        if batch.is_empty() {
            return Ok(None);
        }
        Ok(Some(Prepared {
            sql,
            rows: batch.parameter_rows(),
        }))
    }

    fn finish(
        &self,
        mode: WriteMode,
        batch: &Batch,
        start: Instant,
        outcome: Result<u64>,
    ) -> Result<WriteResult> {
        match outcome {
            Ok(rows_affected) => {
                let result = WriteResult::new(mode, batch.len(), rows_affected, start.elapsed());
                self.stats.record_batch(&result);
                debug!(
                    table = batch.table(),
                    mode = %mode,
                    records = result.records,
                    rows_affected,
                    elapsed_ms = result.elapsed.as_millis() as u64,
                    "Batch written"
                );
                Ok(result)
            }
            Err(e) => {
                self.stats.record_failure();
                warn!(
                    table = batch.table(),
                    mode = %mode,
                    category = %e.category(),
                    error = %e,
                    "Batch write failed"
                );
                Err(e)
            }
        }
    }
}

impl fmt::Debug for BulkWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkWriter")
            .field("dialect", &self.dialect.name())
            .field("sanitizer", &self.sanitizer)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

/// Run statements in a transaction owned by this call.
///
/// Rolls back on failure; a connection whose rollback fails is not reused.
async fn write_owned(mut conn: PooledConnection, statements: &[Prepared]) -> Result<Vec<u64>> {
    let tx = conn.begin().await?;

    let mut counts = Vec::with_capacity(statements.len());
    let mut failure = None;
    for stmt in statements {
        match tx.execute_many(&stmt.sql, &stmt.rows).await {
            Ok(n) => counts.push(n),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    match failure {
        None => {
            tx.commit().await?;
            Ok(counts)
        }
        Some(e) => {
            if let Err(rollback) = tx.rollback().await {
                debug!(error = %rollback, "Rollback after failed write failed");
                conn.mark_broken();
            }
            Err(e)
        }
    }
}
