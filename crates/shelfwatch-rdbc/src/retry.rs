//! Retry policy and the executor every database call goes through.
//!
//! Connectivity failures (connection loss, timeout, pool exhaustion,
//! deadlock) are retried after a delay; integrity and all other failures
//! are returned to the caller on the spot. A connection-loss failure also
//! makes the executor replace the pool before the next attempt.
//!
//! The default policy retries forever at a fixed 60 second interval. There
//! is no cancellation: a caller that needs bounded latency wraps the call in
//! its own timeout or uses a bounded policy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::manager::PoolManager;
use crate::pool::{ConnectionPool, PooledConnection};

/// When and how often to retry connectivity failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub interval: Duration,
    /// Total attempts allowed, first one included (`None` = unbounded)
    pub max_attempts: Option<u32>,
    /// Multiplier applied to the delay after every retry (1.0 = fixed)
    pub backoff_multiplier: f64,
    /// Upper bound for the delay
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(60))
    }
}

impl RetryPolicy {
    /// Retry forever with a fixed delay
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            backoff_multiplier: 1.0,
            max_interval: interval,
        }
    }

    /// At most `max_attempts` attempts with a fixed delay
    pub fn bounded(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            ..Self::fixed(interval)
        }
    }

    /// Set max attempts (builder pattern)
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts.map(|n| n.max(1));
        self
    }

    /// Set backoff multiplier (builder pattern)
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        self
    }

    /// Set the delay cap (builder pattern)
    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based)
    #[inline]
    pub fn allows_retry(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        if self.backoff_multiplier <= 1.0 {
            return self.interval;
        }

        // cap the exponent so the float math stays finite
        let exponent = (attempt - 1).min(30) as i32;
        let delay = self.interval.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let cap = self.max_interval.max(self.interval).as_secs_f64();
        Duration::from_secs_f64(delay.min(cap))
    }
}

/// Runs operations against a pooled connection under a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct ResilientExecutor {
    manager: Arc<PoolManager>,
    policy: RetryPolicy,
}

impl ResilientExecutor {
    /// Create an executor
    pub fn new(manager: Arc<PoolManager>, policy: RetryPolicy) -> Self {
        Self { manager, policy }
    }

    /// The policy in force
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The pool manager connections are drawn from
    pub fn manager(&self) -> &Arc<PoolManager> {
        &self.manager
    }

    /// Run `op` on a pooled connection, retrying connectivity failures.
    ///
    /// `op` gets a fresh connection on every attempt. Any error that is not
    /// in the connectivity class is returned as is, and so is the last
    /// connectivity error once a bounded policy runs out of attempts.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(PooledConnection) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);

            let (generation, outcome) = match self.manager.pool().await {
                Some(pool) => {
                    let generation = pool.generation();
                    let outcome = match pool.get().await {
                        Ok(conn) => op(conn).await,
                        Err(e) => Err(e),
                    };
                    (Some(generation), outcome)
                }
                None => (None, Err(Error::connection("connection pool is unavailable"))),
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = label, attempt, "Database operation recovered");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !err.is_retriable() || !self.policy.allows_retry(attempt) {
                return Err(err);
            }

            let delay = self.policy.delay_for_attempt(attempt);
            warn!(
                operation = label,
                attempt,
                category = %err.category(),
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Database operation failed, retrying"
            );

            if err.category().requires_rebuild() {
                match generation {
                    Some(generation) => self.manager.dispose_and_rebuild_if(generation).await,
                    None => self.manager.dispose_and_rebuild().await,
                };
            }

            tokio::time::sleep(delay).await;
        }
    }

    /// Borrow a connection, retrying acquisition like any other operation
    pub async fn acquire(&self) -> Result<PooledConnection> {
        self.run("acquire", |conn| async move { Ok(conn) }).await
    }
}
