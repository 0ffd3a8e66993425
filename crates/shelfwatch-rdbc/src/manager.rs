//! Owner of the one live connection pool.
//!
//! The pool is built lazily on first use and replaced wholesale when it is
//! confirmed broken. Readers only ever see a complete pool: the swap happens
//! under a write lock, and the old pool is shut down before the new one is
//! published.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::connection::ConnectionFactory;
use crate::error::Result;
use crate::pool::{ConnectionPool, PoolConfig, SimpleConnectionPool};

/// Lazily builds, hands out, and rebuilds the shared pool
pub struct PoolManager {
    config: PoolConfig,
    factory: Arc<dyn ConnectionFactory>,
    current: RwLock<Option<Arc<SimpleConnectionPool>>>,
    generation: AtomicU64,
}

impl PoolManager {
    /// Create a manager. Validates the configuration; no connection is
    /// opened until the pool is first requested.
    pub fn new(config: PoolConfig, factory: Arc<dyn ConnectionFactory>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            factory,
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
        })
    }

    /// Pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Generation of the most recently built pool (0 before the first build)
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The current pool, built on first use.
    ///
    /// Returns `None` when the pool cannot be built; the failure is logged.
    /// Repeated calls return the same pool until a rebuild happens.
    pub async fn pool(&self) -> Option<Arc<SimpleConnectionPool>> {
        if let Some(pool) = self.current.read().await.as_ref() {
            return Some(Arc::clone(pool));
        }

        let mut current = self.current.write().await;
        if let Some(pool) = current.as_ref() {
            return Some(Arc::clone(pool));
        }
        let pool = self.build().await?;
        *current = Some(Arc::clone(&pool));
        Some(pool)
    }

    /// The current pool, without building one
    pub async fn current(&self) -> Option<Arc<SimpleConnectionPool>> {
        self.current.read().await.clone()
    }

    /// Shut the current pool down and build a replacement
    pub async fn dispose_and_rebuild(&self) -> Option<Arc<SimpleConnectionPool>> {
        let mut current = self.current.write().await;
        if let Some(old) = current.take() {
            info!(generation = old.generation(), "Disposing connection pool");
            dispose(&old).await;
        }
        let pool = self.build().await?;
        *current = Some(Arc::clone(&pool));
        Some(pool)
    }

    /// Rebuild only if the pool of `generation` is still the current one.
    ///
    /// Callers that saw the same broken pool trigger a single rebuild; the
    /// rest get the replacement.
    pub async fn dispose_and_rebuild_if(
        &self,
        generation: u64,
    ) -> Option<Arc<SimpleConnectionPool>> {
        {
            let current = self.current.read().await;
            if let Some(pool) = current.as_ref() {
                if pool.generation() != generation {
                    return Some(Arc::clone(pool));
                }
            }
        }

        let mut current = self.current.write().await;
        match current.as_ref() {
            Some(pool) if pool.generation() != generation => return Some(Arc::clone(pool)),
            Some(pool) => {
                info!(generation, "Disposing broken connection pool");
                dispose(pool).await;
                *current = None;
            }
            None => {}
        }
        let pool = self.build().await?;
        *current = Some(Arc::clone(&pool));
        Some(pool)
    }

    /// Dispose the pool at shutdown. A later `pool()` builds a fresh one.
    pub async fn close(&self) -> Result<()> {
        let old = self.current.write().await.take();
        if let Some(pool) = old {
            info!(generation = pool.generation(), "Closing connection pool");
            pool.close().await?;
        }
        Ok(())
    }

    async fn build(&self) -> Option<Arc<SimpleConnectionPool>> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        match SimpleConnectionPool::new(self.config.clone(), Arc::clone(&self.factory), generation)
            .await
        {
            Ok(pool) => {
                info!(
                    generation,
                    host = %self.config.connection.host,
                    database = %self.config.connection.database,
                    max_size = self.config.max_size,
                    max_overflow = self.config.max_overflow,
                    "Connection pool created"
                );
                Some(pool)
            }
            Err(e) => {
                error!(
                    generation,
                    host = %self.config.connection.host,
                    category = %e.category(),
                    error = %e,
                    "Failed to create connection pool"
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("config", &self.config)
            .field("generation", &self.generation())
            .finish()
    }
}

// Errors from a pool being replaced are logged, not returned
async fn dispose(pool: &SimpleConnectionPool) {
    if let Err(e) = pool.close().await {
        warn!(
            generation = pool.generation(),
            category = %e.category(),
            error = %e,
            "Failed to close replaced connection pool"
        );
    }
}

