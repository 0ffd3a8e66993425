//! Testing utilities
//!
//! An in-memory [`ConnectionFactory`] whose connections record every
//! statement and fail on demand, so pool, retry and writer behavior can be
//! exercised without a database.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use shelfwatch_rdbc::prelude::*;
//! use shelfwatch_rdbc::testing::MockConnectionFactory;
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! let factory = MockConnectionFactory::new().fail_connects(2);
//! let config = StoreConfig::new(ConnectionConfig::new("mock", "tester"))
//!     .with_retry(RetryPolicy::bounded(5, Duration::ZERO));
//! let store = AnalyticsStore::new(config, Arc::new(factory.clone())).unwrap();
//!
//! let affected = store.execute("DELETE FROM shelf_fill_events", &[]).await.unwrap();
//! assert_eq!(affected, 1);
//! assert_eq!(factory.connect_attempts(), 3);
//! # });
//! # }
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::connection::{Connection, ConnectionConfig, ConnectionFactory, Transaction};
use crate::error::{Error, Result};
use crate::types::{ResultSet, Value};

/// Custom statement handler: gets the SQL and parameters, returns the
/// affected row count or an error
pub type ExecuteHandler = Arc<dyn Fn(&str, &[Value]) -> Result<u64> + Send + Sync>;

#[derive(Default)]
struct MockState {
    connect_attempts: usize,
    connects: usize,
    connect_failures: usize,
    execute_failures: usize,
    constraint: Option<String>,
    handler: Option<ExecuteHandler>,
    query_result: Option<ResultSet>,
    statements: Vec<String>,
    commits: usize,
    rollbacks: usize,
    closes: usize,
}

/// Scriptable in-memory connection factory.
///
/// Clones share state: keep one clone for assertions and hand another to
/// the code under test.
#[derive(Clone, Default)]
pub struct MockConnectionFactory {
    state: Arc<Mutex<MockState>>,
}

impl MockConnectionFactory {
    /// Create a factory whose connections succeed at everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `n` connection attempts
    pub fn fail_connects(self, n: usize) -> Self {
        self.state.lock().connect_failures = n;
        self
    }

    /// Fail the next `n` statements with a connection-loss error
    pub fn fail_executes(self, n: usize) -> Self {
        self.state.lock().execute_failures = n;
        self
    }

    /// Fail every data statement with a violation of `constraint`
    pub fn violate_constraint(self, constraint: impl Into<String>) -> Self {
        self.state.lock().constraint = Some(constraint.into());
        self
    }

    /// Answer data statements with `handler` instead of "1 row affected"
    pub fn on_execute<F>(self, handler: F) -> Self
    where
        F: Fn(&str, &[Value]) -> Result<u64> + Send + Sync + 'static,
    {
        self.state.lock().handler = Some(Arc::new(handler));
        self
    }

    /// Result returned by every query
    pub fn with_query_result(self, result: ResultSet) -> Self {
        self.state.lock().query_result = Some(result);
        self
    }

    /// Refuse the next `n` connection attempts, on a factory already in use
    pub fn set_connect_failures(&self, n: usize) {
        self.state.lock().connect_failures = n;
    }

    /// Fail the next `n` statements, on a factory already in use
    pub fn set_execute_failures(&self, n: usize) {
        self.state.lock().execute_failures = n;
    }

    /// Connection attempts, failed ones included
    pub fn connect_attempts(&self) -> usize {
        self.state.lock().connect_attempts
    }

    /// Connections opened
    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    /// Connections closed explicitly
    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    /// Every statement received, control statements included, in order
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    /// Statements received other than `BEGIN`, `COMMIT` and `ROLLBACK`
    pub fn data_statements(&self) -> Vec<String> {
        self.state
            .lock()
            .statements
            .iter()
            .filter(|s| !matches!(s.as_str(), "BEGIN" | "COMMIT" | "ROLLBACK"))
            .cloned()
            .collect()
    }

    /// Committed transactions
    pub fn commits(&self) -> usize {
        self.state.lock().commits
    }

    /// Rolled back transactions
    pub fn rollbacks(&self) -> usize {
        self.state.lock().rollbacks
    }
}

impl std::fmt::Debug for MockConnectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockConnectionFactory")
            .field("connects", &state.connects)
            .field("statements", &state.statements.len())
            .field("commits", &state.commits)
            .field("rollbacks", &state.rollbacks)
            .finish()
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        let mut state = self.state.lock();
        state.connect_attempts += 1;
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(Error::connection(format!(
                "mock: connection to {}:{} refused",
                config.host, config.port
            )));
        }
        state.connects += 1;
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
            tx_open: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
        }))
    }
}

fn record(state: &Mutex<MockState>, sql: &str) {
    state.lock().statements.push(sql.to_string());
}

fn run_statement(state: &Mutex<MockState>, sql: &str, params: &[Value]) -> Result<u64> {
    let handler = {
        let mut state = state.lock();
        state.statements.push(sql.to_string());
        if state.execute_failures > 0 {
            state.execute_failures -= 1;
            return Err(Error::connection("mock: connection reset by peer"));
        }
        if let Some(constraint) = &state.constraint {
            return Err(Error::constraint(
                constraint.clone(),
                "mock: duplicate key value violates unique constraint",
            ));
        }
        state.handler.clone()
    };

    match handler {
        Some(handler) => handler(sql, params),
        None => Ok(1),
    }
}

fn run_query(state: &Mutex<MockState>, sql: &str) -> Result<ResultSet> {
    let mut state = state.lock();
    state.statements.push(sql.to_string());
    if state.execute_failures > 0 {
        state.execute_failures -= 1;
        return Err(Error::connection("mock: connection reset by peer"));
    }
    Ok(state.query_result.clone().unwrap_or_default())
}

/// Connection handed out by [`MockConnectionFactory`]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
    tx_open: Arc<AtomicBool>,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for MockConnection {
    async fn query(&self, sql: &str, _params: &[Value]) -> Result<ResultSet> {
        run_query(&self.state, sql)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        run_statement(&self.state, sql, params)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        if self.tx_open.swap(true, Ordering::AcqRel) {
            return Err(Error::transaction("a transaction is already open on this connection"));
        }
        record(&self.state, "BEGIN");
        Ok(Box::new(MockTransaction {
            state: Arc::clone(&self.state),
            tx_open: Arc::clone(&self.tx_open),
        }))
    }

    fn in_transaction(&self) -> bool {
        self.tx_open.load(Ordering::Acquire)
    }

    async fn is_valid(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.state.lock().closes += 1;
        }
        Ok(())
    }
}

struct MockTransaction {
    state: Arc<Mutex<MockState>>,
    tx_open: Arc<AtomicBool>,
}

#[async_trait]
impl Transaction for MockTransaction {
    async fn query(&self, sql: &str, _params: &[Value]) -> Result<ResultSet> {
        run_query(&self.state, sql)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        run_statement(&self.state, sql, params)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.statements.push("COMMIT".into());
            state.commits += 1;
        }
        self.tx_open.store(false, Ordering::Release);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.statements.push("ROLLBACK".into());
            state.rollbacks += 1;
        }
        self.tx_open.store(false, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_failures_then_success() {
        let factory = MockConnectionFactory::new().fail_connects(1);
        let config = ConnectionConfig::new("mock", "tester");

        assert!(factory.connect(&config).await.is_err());
        let conn = factory.connect(&config).await.unwrap();
        assert_eq!(factory.connect_attempts(), 2);
        assert_eq!(factory.connects(), 1);
        assert_eq!(conn.execute("SELECT 1", &[]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_transaction_state() {
        let factory = MockConnectionFactory::new();
        let conn = factory
            .connect(&ConnectionConfig::new("mock", "tester"))
            .await
            .unwrap();

        let tx = conn.begin().await.unwrap();
        assert!(conn.in_transaction());
        assert!(conn.begin().await.is_err());
        tx.execute("INSERT", &[]).await.unwrap();
        tx.commit().await.unwrap();
        assert!(!conn.in_transaction());

        assert_eq!(factory.statements(), ["BEGIN", "INSERT", "COMMIT"]);
        assert_eq!(factory.data_statements(), ["INSERT"]);
        assert_eq!(factory.commits(), 1);
    }

    #[tokio::test]
    async fn test_handler_and_constraint() {
        let factory = MockConnectionFactory::new().on_execute(|_, params| Ok(params.len() as u64));
        let conn = factory
            .connect(&ConnectionConfig::new("mock", "tester"))
            .await
            .unwrap();
        assert_eq!(conn.execute("X", &[Value::Null, Value::Null]).await.unwrap(), 2);

        let factory = factory.violate_constraint("fill_pk");
        let err = conn.execute("X", &[]).await.unwrap_err();
        assert!(err.is_integrity());
        assert_eq!(factory.data_statements().len(), 2);
    }
}
