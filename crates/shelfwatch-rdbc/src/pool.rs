//! Connection pool for shelfwatch-rdbc
//!
//! A queue pool with:
//! - `max_size` connections kept idle for reuse
//! - up to `max_overflow` extra connections under load, closed on return
//! - bounded acquire wait (`acquire_timeout`), then `PoolExhausted`
//! - recycling by lifetime and idle time, optional validation on borrow
//! - a generation number so callers can tell pools apart across rebuilds
//!
//! # Example
//!
//! ```rust,ignore
//! use shelfwatch_rdbc::pool::{PoolConfig, SimpleConnectionPool};
//! use shelfwatch_rdbc::postgres::PgConnectionFactory;
//!
//! let pool = SimpleConnectionPool::new(
//!     PoolConfig::new(connection).with_max_size(10),
//!     Arc::new(PgConnectionFactory),
//!     1,
//! ).await?;
//!
//! let conn = pool.get().await?;
//! conn.execute("SELECT 1", &[]).await?;
//! // Connection is returned to pool when dropped
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::connection::{Connection, ConnectionConfig, ConnectionFactory, Transaction};
use crate::error::{Error, Result};
use crate::types::{ResultSet, Value};

/// Connection pool trait
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Get a connection from the pool
    async fn get(&self) -> Result<PooledConnection>;

    /// Take back a borrowed connection
    async fn return_connection(&self, conn: Box<dyn Connection>, created_at: Instant);

    /// Forget a borrowed connection that will not come back
    fn discard_connection(&self);

    /// Generation this pool was built as
    fn generation(&self) -> u64;

    /// Get current number of open connections
    fn size(&self) -> usize;

    /// Get number of idle connections
    fn idle(&self) -> usize;

    /// Get number of connections in use
    fn in_use(&self) -> usize {
        self.size().saturating_sub(self.idle())
    }

    /// Get pool statistics
    fn stats(&self) -> PoolStats;

    /// Close all connections and shutdown the pool
    async fn close(&self) -> Result<()>;
}

/// A connection borrowed from the pool
///
/// Dropping it hands the connection back to the pool it came from. A
/// connection marked broken, or one with a transaction still open, is closed
/// instead.
pub struct PooledConnection {
    conn: Option<Box<dyn Connection>>,
    pool: Arc<dyn ConnectionPool>,
    created_at: Instant,
    broken: bool,
    permit: Option<OwnedSemaphorePermit>,
}

impl PooledConnection {
    /// Wrap a connection borrowed from `pool`
    pub fn new(
        conn: Box<dyn Connection>,
        pool: Arc<dyn ConnectionPool>,
        created_at: Instant,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        Self {
            conn: Some(conn),
            pool,
            created_at,
            broken: false,
            permit,
        }
    }

    /// Generation of the pool this connection was drawn from
    #[inline]
    pub fn generation(&self) -> u64 {
        self.pool.generation()
    }

    /// Time since the underlying session was opened
    #[inline]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Do not return this connection to the pool when dropped
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Whether the connection was marked broken
    #[inline]
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    fn inner(&self) -> Result<&dyn Connection> {
        self.conn
            .as_deref()
            .ok_or_else(|| Error::internal("connection already returned"))
    }
}

#[async_trait]
impl Connection for PooledConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        self.inner()?.query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.inner()?.execute(sql, params).await
    }

    async fn execute_many(&self, sql: &str, rows: &[Vec<Value>]) -> Result<u64> {
        self.inner()?.execute_many(sql, rows).await
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        self.inner()?.begin().await
    }

    fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| c.in_transaction())
    }

    async fn is_valid(&self) -> bool {
        match self.inner() {
            Ok(conn) => conn.is_valid().await,
            Err(_) => false,
        }
    }

    async fn close(&self) -> Result<()> {
        self.inner()?.close().await
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("generation", &self.generation())
            .field("age", &self.age())
            .field("broken", &self.broken)
            .finish()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let permit = self.permit.take();

        if self.broken || conn.in_transaction() {
            self.pool.discard_connection();
            drop(permit);
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = self.pool.clone();
                let created_at = self.created_at;
                handle.spawn(async move {
                    pool.return_connection(conn, created_at).await;
                    drop(permit);
                });
            }
            Err(_) => {
                // No runtime to hand the connection back on
                self.pool.discard_connection();
                drop(permit);
            }
        }
    }
}

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Connection configuration
    pub connection: ConnectionConfig,
    /// Connections opened eagerly when the pool is built
    pub min_size: usize,
    /// Connections kept idle for reuse
    pub max_size: usize,
    /// Extra connections allowed above `max_size` under load
    pub max_overflow: usize,
    /// Maximum time to wait for a connection
    pub acquire_timeout: Duration,
    /// Maximum connection lifetime (for recycling)
    pub max_lifetime: Duration,
    /// Idle timeout (connections idle longer are closed)
    pub idle_timeout: Duration,
    /// Whether to test connections on borrow
    pub test_on_borrow: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            min_size: 0,
            max_size: 100,
            max_overflow: 100,
            acquire_timeout: Duration::from_secs(300),
            max_lifetime: Duration::from_secs(1800), // 30 minutes
            idle_timeout: Duration::from_secs(600),  // 10 minutes
            test_on_borrow: true,
        }
    }
}

impl PoolConfig {
    /// Create pool config for a connection
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            ..Default::default()
        }
    }

    /// Set minimum pool size
    pub fn with_min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    /// Set maximum pool size
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Set overflow above the pool size
    pub fn with_max_overflow(mut self, overflow: usize) -> Self {
        self.max_overflow = overflow;
        self
    }

    /// Set acquire timeout
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set maximum connection lifetime
    pub fn with_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Set idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Enable/disable test on borrow
    pub fn with_test_on_borrow(mut self, test: bool) -> Self {
        self.test_on_borrow = test;
        self
    }

    /// Upper bound on simultaneously open connections
    #[inline]
    pub fn capacity(&self) -> usize {
        self.max_size.saturating_add(self.max_overflow)
    }

    /// Check the bounds are usable
    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;
        if self.max_size == 0 {
            return Err(Error::config("pool max_size must be at least 1"));
        }
        if self.min_size > self.max_size {
            return Err(Error::config(format!(
                "pool min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.capacity() > Semaphore::MAX_PERMITS {
            return Err(Error::config("pool capacity too large"));
        }
        if self.acquire_timeout.is_zero() {
            return Err(Error::config("pool acquire_timeout must be non-zero"));
        }
        Ok(())
    }
}

/// Pool statistics
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Total number of connections created
    pub connections_created: u64,
    /// Total number of connections closed
    pub connections_closed: u64,
    /// Total number of connection acquisitions
    pub acquisitions: u64,
    /// Number of times pool was exhausted
    pub exhausted_count: u64,
    /// Total wait time for connections (in milliseconds)
    pub total_wait_time_ms: u64,
    /// Number of health check failures
    pub health_check_failures: u64,
}

/// Atomic pool stats for concurrent updates
#[derive(Debug, Default)]
#[allow(missing_docs)]
pub struct AtomicPoolStats {
    pub connections_created: AtomicU64,
    pub connections_closed: AtomicU64,
    pub acquisitions: AtomicU64,
    pub exhausted_count: AtomicU64,
    pub total_wait_time_ms: AtomicU64,
    pub health_check_failures: AtomicU64,
}

impl AtomicPoolStats {
    /// Create new atomic stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection creation
    pub fn record_created(&self) {
        self.connections_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection close
    pub fn record_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an acquisition
    pub fn record_acquisition(&self, wait_time_ms: u64) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        self.total_wait_time_ms
            .fetch_add(wait_time_ms, Ordering::Relaxed);
    }

    /// Record pool exhaustion
    pub fn record_exhausted(&self) {
        self.exhausted_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record health check failure
    pub fn record_health_check_failure(&self) {
        self.health_check_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot current stats
    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            connections_created: self.connections_created.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            exhausted_count: self.exhausted_count.load(Ordering::Relaxed),
            total_wait_time_ms: self.total_wait_time_ms.load(Ordering::Relaxed),
            health_check_failures: self.health_check_failures.load(Ordering::Relaxed),
        }
    }

    /// Calculate average wait time in milliseconds
    pub fn avg_wait_time_ms(&self) -> f64 {
        let acquisitions = self.acquisitions.load(Ordering::Relaxed);
        if acquisitions == 0 {
            0.0
        } else {
            self.total_wait_time_ms.load(Ordering::Relaxed) as f64 / acquisitions as f64
        }
    }
}

// ============================================================================
// SimpleConnectionPool
// ============================================================================

/// Semaphore-bounded queue pool.
///
/// The semaphore holds `max_size + max_overflow` permits; every borrowed
/// connection carries one. Idle connections are reused LIFO and the idle list
/// never grows past `max_size`, so overflow connections are closed as soon as
/// they come back.
pub struct SimpleConnectionPool {
    config: PoolConfig,
    factory: Arc<dyn ConnectionFactory>,
    generation: u64,
    idle: Mutex<Vec<PoolEntry>>,
    idle_count: AtomicUsize,
    semaphore: Arc<Semaphore>,
    total_connections: AtomicUsize,
    stats: Arc<AtomicPoolStats>,
    shutdown: AtomicBool,
    self_ref: Weak<Self>,
}

struct PoolEntry {
    conn: Box<dyn Connection>,
    created_at: Instant,
    last_used: Instant,
}

impl SimpleConnectionPool {
    /// Create a new connection pool.
    ///
    /// Validates the configuration and opens `min_size` connections eagerly;
    /// any failure there fails the whole build.
    pub async fn new(
        config: PoolConfig,
        factory: Arc<dyn ConnectionFactory>,
        generation: u64,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let pool = Arc::new_cyclic(|self_ref| Self {
            semaphore: Arc::new(Semaphore::new(config.capacity())),
            idle: Mutex::new(Vec::with_capacity(config.max_size)),
            idle_count: AtomicUsize::new(0),
            config,
            factory,
            generation,
            total_connections: AtomicUsize::new(0),
            stats: Arc::new(AtomicPoolStats::new()),
            shutdown: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        });

        for _ in 0..pool.config.min_size {
            let conn = pool.create_connection().await?;
            let now = Instant::now();
            pool.push_idle(PoolEntry {
                conn,
                created_at: now,
                last_used: now,
            });
        }

        Ok(pool)
    }

    /// Create a new connection using the factory
    async fn create_connection(&self) -> Result<Box<dyn Connection>> {
        let conn = self.factory.connect(&self.config.connection).await?;
        self.total_connections.fetch_add(1, Ordering::AcqRel);
        self.stats.record_created();
        Ok(conn)
    }

    fn push_idle(&self, entry: PoolEntry) {
        let mut idle = self.idle.lock();
        idle.push(entry);
        self.idle_count.store(idle.len(), Ordering::Release);
    }

    /// Push unless the idle list is already at `max_size`; hands the entry
    /// back when it does not fit.
    fn try_push_idle(&self, entry: PoolEntry) -> Option<PoolEntry> {
        let mut idle = self.idle.lock();
        if idle.len() >= self.config.max_size {
            return Some(entry);
        }
        idle.push(entry);
        self.idle_count.store(idle.len(), Ordering::Release);
        None
    }

    fn pop_idle(&self) -> Option<PoolEntry> {
        let mut idle = self.idle.lock();
        let entry = idle.pop();
        self.idle_count.store(idle.len(), Ordering::Release);
        entry
    }

    fn record_dropped(&self) {
        self.total_connections.fetch_sub(1, Ordering::AcqRel);
        self.stats.record_closed();
    }

    /// Check if a connection should be recycled (expired)
    fn should_recycle(&self, entry: &PoolEntry) -> bool {
        entry.created_at.elapsed() > self.config.max_lifetime
            || entry.last_used.elapsed() > self.config.idle_timeout
    }

    /// Get pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Whether `close` has been called
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ConnectionPool for SimpleConnectionPool {
    async fn get(&self) -> Result<PooledConnection> {
        if self.is_shut_down() {
            return Err(Error::pool_exhausted("pool is shut down"));
        }

        let start = Instant::now();

        let permit = tokio::time::timeout(
            self.config.acquire_timeout,
            self.semaphore.clone().acquire_owned(),
        )
        .await
        .map_err(|_| {
            self.stats.record_exhausted();
            Error::pool_exhausted(format!(
                "timeout waiting for connection ({}ms, {} in use)",
                self.config.acquire_timeout.as_millis(),
                self.in_use()
            ))
        })?
        .map_err(|_| Error::pool_exhausted("pool is shut down"))?;

        let mut reused = None;
        while let Some(entry) = self.pop_idle() {
            if self.should_recycle(&entry) {
                let _ = entry.conn.close().await;
                self.record_dropped();
                continue;
            }
            if self.config.test_on_borrow && !entry.conn.is_valid().await {
                self.record_dropped();
                self.stats.record_health_check_failure();
                continue;
            }
            reused = Some(entry);
            break;
        }

        let (conn, created_at) = match reused {
            Some(entry) => (entry.conn, entry.created_at),
            None => (self.create_connection().await?, Instant::now()),
        };

        self.stats
            .record_acquisition(start.elapsed().as_millis() as u64);

        let pool: Arc<dyn ConnectionPool> = self
            .self_ref
            .upgrade()
            .ok_or_else(|| Error::pool_exhausted("pool has been dropped"))?;

        Ok(PooledConnection::new(conn, pool, created_at, Some(permit)))
    }

    async fn return_connection(&self, conn: Box<dyn Connection>, created_at: Instant) {
        let rejected = if self.is_shut_down() || conn.in_transaction() {
            Some(conn)
        } else {
            self.try_push_idle(PoolEntry {
                conn,
                created_at,
                last_used: Instant::now(),
            })
            .map(|entry| entry.conn)
        };

        if let Some(conn) = rejected {
            debug!(generation = self.generation, "Closing returned connection");
            let _ = conn.close().await;
            self.record_dropped();
            return;
        }

        // close() may have drained the list while this entry was in flight
        if self.is_shut_down() {
            while let Some(entry) = self.pop_idle() {
                let _ = entry.conn.close().await;
                self.record_dropped();
            }
        }
    }

    fn discard_connection(&self) {
        self.record_dropped();
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn size(&self) -> usize {
        self.total_connections.load(Ordering::Acquire)
    }

    fn idle(&self) -> usize {
        self.idle_count.load(Ordering::Acquire)
    }

    fn stats(&self) -> PoolStats {
        self.stats.snapshot()
    }

    async fn close(&self) -> Result<()> {
        self.shutdown.store(true, Ordering::Release);
        self.semaphore.close();

        let drained: Vec<PoolEntry> = {
            let mut idle = self.idle.lock();
            let drained = idle.drain(..).collect();
            self.idle_count.store(0, Ordering::Release);
            drained
        };

        for entry in drained {
            let _ = entry.conn.close().await;
            self.record_dropped();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_builder() {
        let config = PoolConfig::new(ConnectionConfig::new("localhost", "loyal"))
            .with_min_size(5)
            .with_max_size(20)
            .with_max_overflow(10)
            .with_acquire_timeout(Duration::from_secs(10))
            .with_test_on_borrow(false);

        assert_eq!(config.min_size, 5);
        assert_eq!(config.max_size, 20);
        assert_eq!(config.capacity(), 30);
        assert_eq!(config.acquire_timeout, Duration::from_secs(10));
        assert!(!config.test_on_borrow);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.max_size, 100);
        assert_eq!(config.max_overflow, 100);
        assert_eq!(config.acquire_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_pool_config_validate() {
        let base = PoolConfig::new(ConnectionConfig::new("localhost", "loyal"));
        assert!(base.clone().with_max_size(0).validate().is_err());
        assert!(base.clone().with_min_size(200).validate().is_err());
        assert!(base
            .clone()
            .with_acquire_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(PoolConfig::default().validate().is_err());
    }

    #[test]
    fn test_atomic_pool_stats() {
        let stats = AtomicPoolStats::new();

        stats.record_created();
        stats.record_created();
        stats.record_acquisition(100);
        stats.record_acquisition(200);
        stats.record_closed();
        stats.record_exhausted();
        stats.record_health_check_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.connections_created, 2);
        assert_eq!(snapshot.connections_closed, 1);
        assert_eq!(snapshot.acquisitions, 2);
        assert_eq!(snapshot.total_wait_time_ms, 300);
        assert_eq!(snapshot.exhausted_count, 1);
        assert_eq!(snapshot.health_check_failures, 1);

        assert!((stats.avg_wait_time_ms() - 150.0).abs() < 0.01);
    }
}
