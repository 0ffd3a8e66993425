//! Error types for shelfwatch-rdbc
//!
//! Every error carries a category that drives the retry policy:
//! - Connectivity errors (connection loss, timeout, pool exhaustion, deadlock)
//!   are retried by the resilient executor
//! - Integrity errors (unique, foreign key, not-null, check violations) are
//!   surfaced to the caller immediately
//! - Configuration and everything else is surfaced immediately

use std::fmt;
use thiserror::Error;

/// Result type for shelfwatch-rdbc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Server unreachable or connection dropped (retriable)
    Connection,
    /// Statement rejected by the server
    Query,
    /// BEGIN/COMMIT/ROLLBACK failed
    Transaction,
    /// Uniqueness or referential constraint violated (never retried)
    Constraint,
    /// A value could not be bound to or read from a column
    TypeConversion,
    /// Operation timed out (retriable)
    Timeout,
    /// Deadlock or serialization failure (retriable)
    Deadlock,
    /// Credentials rejected
    Authentication,
    /// Pool could not be built from the given settings
    Configuration,
    /// No pooled connection became available in time (retriable)
    PoolExhausted,
    /// Batch violates its own invariants
    InvalidBatch,
    /// Unknown/other errors
    Other,
}

impl ErrorCategory {
    /// Whether errors in this category indicate a connectivity failure and
    /// are therefore retried
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(
            self,
            Self::Connection | Self::Timeout | Self::Deadlock | Self::PoolExhausted
        )
    }

    /// Whether errors in this category are data-integrity failures
    #[inline]
    pub const fn is_integrity(self) -> bool {
        matches!(self, Self::Constraint)
    }

    /// Whether a failure in this category means the pool itself is suspect
    /// and should be disposed and rebuilt before the next attempt
    #[inline]
    pub const fn requires_rebuild(self) -> bool {
        matches!(self, Self::Connection)
    }
}

/// Main error type for shelfwatch-rdbc
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Connection failed or was lost
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution failed
    #[error("query error: {message}")]
    Query {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Transaction error
    #[error("transaction error: {message}")]
    Transaction {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Constraint violation (PK, FK, unique, check, not-null)
    #[error("constraint violation: {constraint_name} - {message}")]
    Constraint {
        constraint_name: String,
        message: String,
    },

    /// Type conversion failed
    #[error("type conversion error: {message}")]
    TypeConversion { message: String },

    /// Operation timed out
    #[error("timeout: {message}")]
    Timeout { message: String },

    /// Deadlock or serialization failure
    #[error("deadlock detected: {message}")]
    Deadlock { message: String },

    /// Authentication failed
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Connection pool exhausted
    #[error("pool exhausted: {message}")]
    PoolExhausted { message: String },

    /// Batch is malformed (empty column list, key outside columns, ...)
    #[error("invalid batch: {message}")]
    InvalidBatch { message: String },

    /// Internal error
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Query { .. } => ErrorCategory::Query,
            Self::Transaction { .. } => ErrorCategory::Transaction,
            Self::Constraint { .. } => ErrorCategory::Constraint,
            Self::TypeConversion { .. } => ErrorCategory::TypeConversion,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Deadlock { .. } => ErrorCategory::Deadlock,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::PoolExhausted { .. } => ErrorCategory::PoolExhausted,
            Self::InvalidBatch { .. } => ErrorCategory::InvalidBatch,
            Self::Internal { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this error is retriable
    #[inline]
    pub fn is_retriable(&self) -> bool {
        self.category().is_retriable()
    }

    /// Whether this error is an integrity violation
    #[inline]
    pub fn is_integrity(&self) -> bool {
        self.category().is_integrity()
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Create a query error with SQL
    pub fn query_with_sql(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: Some(sql.into()),
            source: None,
        }
    }

    /// Create a constraint violation error
    pub fn constraint(constraint_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Constraint {
            constraint_name: constraint_name.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a deadlock error
    pub fn deadlock(message: impl Into<String>) -> Self {
        Self::Deadlock {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a type conversion error
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: message.into(),
        }
    }

    /// Create a transaction error
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
            source: None,
        }
    }

    /// Create a pool exhausted error
    pub fn pool_exhausted(message: impl Into<String>) -> Self {
        Self::PoolExhausted {
            message: message.into(),
        }
    }

    /// Create an invalid batch error
    pub fn invalid_batch(message: impl Into<String>) -> Self {
        Self::InvalidBatch {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Query => write!(f, "query"),
            Self::Transaction => write!(f, "transaction"),
            Self::Constraint => write!(f, "constraint"),
            Self::TypeConversion => write!(f, "type_conversion"),
            Self::Timeout => write!(f, "timeout"),
            Self::Deadlock => write!(f, "deadlock"),
            Self::Authentication => write!(f, "authentication"),
            Self::Configuration => write!(f, "configuration"),
            Self::PoolExhausted => write!(f, "pool_exhausted"),
            Self::InvalidBatch => write!(f, "invalid_batch"),
            Self::Other => write!(f, "other"),
        }
    }
}
