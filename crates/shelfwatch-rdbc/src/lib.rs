//! # shelfwatch-rdbc
//!
//! Resilient pooled PostgreSQL access for the shelf-monitoring pipeline.
//!
//! Camera workers and batch jobs persist analytic records through one
//! [`AnalyticsStore`](store::AnalyticsStore). The store owns a single
//! connection pool, retries every operation that fails for connectivity
//! reasons, and writes batches with one of four strategies.
//!
//! ## Features
//!
//! - **Connection Pooling**: queue pool with `max_size` reusable and
//!   `max_overflow` transient connections, lifetime/idle recycling and
//!   validation on borrow
//! - **Pool Replacement**: the pool is built lazily and rebuilt wholesale
//!   when a connection-loss error shows it is broken
//! - **Retry Policy**: connectivity failures are retried (fixed 60 s
//!   interval, unbounded by default); integrity violations never are
//! - **Bulk Writes**: upsert, insert-if-absent, update-only and plain insert
//!   built with sea-query, prepared once per batch
//! - **Sanitization**: `"nan"`, `"<NA>"`, empty strings, NaN and (optionally)
//!   numeric zero all become SQL `NULL`
//! - **Caller Transactions**: several writes committed as one unit
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shelfwatch_rdbc::prelude::*;
//!
//! let store = AnalyticsStore::connect_postgres(StoreConfig::from_env()?)?;
//!
//! let batch = Batch::new("shelf_fill_events", ["store_id", "ts", "fill_pct"], ["store_id", "ts"])
//!     .with_records([Record::new()
//!         .with("store_id", 7)
//!         .with("ts", "2026-01-01T00:00:00")
//!         .with("fill_pct", 42.5)]);
//! store.write(WriteMode::Upsert, &batch).await?;
//!
//! let avg = store
//!     .query_scalar("SELECT avg(fill_pct) FROM shelf_fill_events WHERE store_id = $1", &[7.into()])
//!     .await?;
//! ```
//!
//! ## Identifiers
//!
//! Table and column names are written into statement text as quoted
//! identifiers. They must come from the calling code, never from end users.
//! [`Batch::validate`](record::Batch::validate) rejects anything that is not
//! a plain identifier.
//!
//! ## Feature Flags
//!
//! - `postgres` (default) - PostgreSQL backend via tokio-postgres

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod events;
pub mod manager;
pub mod pool;
pub mod query;
pub mod record;
pub mod retry;
pub mod sanitize;
pub mod security;
pub mod store;
pub mod testing;
pub mod transaction;
pub mod types;
pub mod writer;

#[cfg(feature = "postgres")]
pub mod postgres;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::StoreConfig;
    pub use crate::connection::{Connection, ConnectionConfig, ConnectionFactory, Transaction};
    pub use crate::dialect::{PostgresDialect, SqlDialect};
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::events::{ShelfFillEvent, StoreEntrance};
    pub use crate::manager::PoolManager;
    pub use crate::pool::{
        ConnectionPool, PoolConfig, PoolStats, PooledConnection, SimpleConnectionPool,
    };
    pub use crate::query::QueryExecutor;
    pub use crate::record::{Batch, Record};
    pub use crate::retry::{ResilientExecutor, RetryPolicy};
    pub use crate::sanitize::{SanitizeOptions, ValueSanitizer};
    pub use crate::store::AnalyticsStore;
    pub use crate::transaction::TransactionHandle;
    pub use crate::types::{ResultSet, Row, Value};
    pub use crate::writer::{BulkWriter, WriteMode, WriteResult, WriterStats};

    #[cfg(feature = "postgres")]
    pub use crate::postgres::PgConnectionFactory;
}

pub use error::{Error, Result};
pub use store::AnalyticsStore;
pub use types::Value;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _value = Value::Int32(42);
        let _config = StoreConfig::new(ConnectionConfig::new("localhost", "loyal"));
        let _policy = RetryPolicy::default();
        let _mode = WriteMode::Upsert;
    }

    #[test]
    fn test_error_types() {
        let err = Error::connection("test error");
        assert!(err.is_retriable());
        assert_eq!(err.category(), ErrorCategory::Connection);
    }

    #[test]
    fn test_value_types() {
        let v = Value::from(42_i32);
        assert!(!v.is_null());
        assert_eq!(v.as_i64(), Some(42));

        let v = Value::from("hello");
        assert_eq!(v.as_str(), Some("hello"));
    }
}
