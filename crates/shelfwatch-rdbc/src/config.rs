//! Store configuration, read from the environment
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `DATABASE_URL` | `postgres://` URL used as the base for the settings below | unset |
//! | `DB_HOST` | server host | required unless `DATABASE_URL` is set |
//! | `DB_PORT` | server port | `5432` |
//! | `DB_USER` | user name | required unless `DATABASE_URL` is set |
//! | `DB_PASSWORD` | password | empty |
//! | `DB_NAME` | database name | `telegram_bots` |
//! | `DB_POOL_SIZE` | connections kept for reuse | `100` |
//! | `DB_MAX_OVERFLOW` | extra connections under load | `100` |
//! | `DB_POOL_TIMEOUT_SECS` | connection acquire timeout | `300` |
//! | `DB_RETRY_INTERVAL_SECS` | delay between retries | `60` |
//! | `DB_RETRY_MAX_ATTEMPTS` | attempt bound, `0` or unset for none | unbounded |
//! | `DB_ZERO_AS_NULL` | collapse numeric zero to NULL | `true` |

use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::connection::ConnectionConfig;
use crate::error::{Error, Result};
use crate::pool::PoolConfig;
use crate::retry::RetryPolicy;
use crate::sanitize::SanitizeOptions;

/// Everything an [`AnalyticsStore`](crate::store::AnalyticsStore) needs
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Pool bounds, connection settings included
    pub pool: PoolConfig,
    /// Retry policy for connectivity failures
    pub retry: RetryPolicy,
    /// Write-path sanitizer settings
    pub sanitize: SanitizeOptions,
}

impl StoreConfig {
    /// Create a configuration for a connection, everything else default
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            pool: PoolConfig::new(connection),
            ..Default::default()
        }
    }

    /// Load `.env` when present, then read the process environment
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the settings through `lookup` (a variable name to value map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut connection = match get("DATABASE_URL") {
            #[cfg(feature = "postgres")]
            Some(url) => ConnectionConfig::from_url(&url)?,
            #[cfg(not(feature = "postgres"))]
            Some(_) => return Err(Error::config("DATABASE_URL needs the postgres feature")),
            None => ConnectionConfig::default(),
        };
        let has_url = get("DATABASE_URL").is_some();

        match get("DB_HOST") {
            Some(host) => connection.host = host,
            None if !has_url => return Err(Error::config("DB_HOST is not set")),
            None => {}
        }
        match get("DB_USER") {
            Some(user) => connection.user = user,
            None if !has_url => return Err(Error::config("DB_USER is not set")),
            None => {}
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            connection.password = password;
        }
        if let Some(database) = get("DB_NAME") {
            connection.database = database;
        }
        if let Some(port) = parse::<u16>(&get, "DB_PORT")? {
            connection.port = port;
        }

        let mut pool = PoolConfig::new(connection);
        if let Some(size) = parse::<usize>(&get, "DB_POOL_SIZE")? {
            pool.max_size = size;
        }
        if let Some(overflow) = parse::<usize>(&get, "DB_MAX_OVERFLOW")? {
            pool.max_overflow = overflow;
        }
        if let Some(secs) = parse::<u64>(&get, "DB_POOL_TIMEOUT_SECS")? {
            pool.acquire_timeout = Duration::from_secs(secs);
        }

        let mut retry = RetryPolicy::default();
        if let Some(secs) = parse::<u64>(&get, "DB_RETRY_INTERVAL_SECS")? {
            retry = RetryPolicy::fixed(Duration::from_secs(secs));
        }
        if let Some(max) = parse::<u32>(&get, "DB_RETRY_MAX_ATTEMPTS")? {
            retry = retry.with_max_attempts((max > 0).then_some(max));
        }

        let mut sanitize = SanitizeOptions::default();
        if let Some(raw) = get("DB_ZERO_AS_NULL") {
            sanitize.zero_as_null = parse_bool("DB_ZERO_AS_NULL", &raw)?;
        }

        let config = Self {
            pool,
            retry,
            sanitize,
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the pool configuration (builder pattern)
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Set the retry policy (builder pattern)
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the sanitizer options (builder pattern)
    pub fn with_sanitize(mut self, sanitize: SanitizeOptions) -> Self {
        self.sanitize = sanitize;
        self
    }

    /// Pool configuration
    pub fn pool_config(&self) -> &PoolConfig {
        &self.pool
    }

    /// Retry policy
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Sanitizer options
    pub fn sanitize_options(&self) -> &SanitizeOptions {
        &self.sanitize
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::config(format!("{} = '{}': {}", key, raw, e)))
        })
        .transpose()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::config(format!("{} = '{}' is not a boolean", key, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_minimal_env_uses_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("DB_HOST", "db.internal"),
            ("DB_USER", "loyal"),
        ]))
        .unwrap();

        let conn = &config.pool.connection;
        assert_eq!(conn.host, "db.internal");
        assert_eq!(conn.user, "loyal");
        assert_eq!(conn.port, 5432);
        assert_eq!(conn.database, "telegram_bots");
        assert_eq!(config.pool.max_size, 100);
        assert_eq!(config.pool.max_overflow, 100);
        assert_eq!(config.pool.acquire_timeout, Duration::from_secs(300));
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.sanitize.zero_as_null);
    }

    #[test]
    fn test_full_env() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6432"),
            ("DB_USER", "loyal"),
            ("DB_PASSWORD", "s3cret"),
            ("DB_NAME", "analytics"),
            ("DB_POOL_SIZE", "10"),
            ("DB_MAX_OVERFLOW", "5"),
            ("DB_POOL_TIMEOUT_SECS", "30"),
            ("DB_RETRY_INTERVAL_SECS", "5"),
            ("DB_RETRY_MAX_ATTEMPTS", "3"),
            ("DB_ZERO_AS_NULL", "false"),
        ]))
        .unwrap();

        assert_eq!(config.pool.connection.port, 6432);
        assert_eq!(config.pool.connection.password, "s3cret");
        assert_eq!(config.pool.connection.database, "analytics");
        assert_eq!(config.pool.capacity(), 15);
        assert_eq!(config.pool.acquire_timeout, Duration::from_secs(30));
        assert_eq!(
            config.retry,
            RetryPolicy::bounded(3, Duration::from_secs(5))
        );
        assert!(!config.sanitize.zero_as_null);
    }

    #[test]
    fn test_zero_attempts_means_unbounded() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("DB_HOST", "h"),
            ("DB_USER", "u"),
            ("DB_RETRY_MAX_ATTEMPTS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.retry.max_attempts, None);
    }

    #[test]
    fn test_missing_required() {
        let err = StoreConfig::from_lookup(lookup(&[("DB_USER", "u")])).unwrap_err();
        assert!(err.to_string().contains("DB_HOST"));

        let err = StoreConfig::from_lookup(lookup(&[("DB_HOST", "h"), ("DB_USER", " ")]))
            .unwrap_err();
        assert!(err.to_string().contains("DB_USER"));
    }

    #[test]
    fn test_unparsable_number() {
        let err = StoreConfig::from_lookup(lookup(&[
            ("DB_HOST", "h"),
            ("DB_USER", "u"),
            ("DB_PORT", "fifty"),
        ]))
        .unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Configuration);
        assert!(err.to_string().contains("DB_PORT"));
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_database_url_base() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://loyal:pw@db.internal:6432/analytics"),
            ("DB_NAME", "override"),
        ]))
        .unwrap();
        assert_eq!(config.pool.connection.host, "db.internal");
        assert_eq!(config.pool.connection.port, 6432);
        assert_eq!(config.pool.connection.password, "pw");
        assert_eq!(config.pool.connection.database, "override");
    }

    #[cfg(not(feature = "postgres"))]
    #[test]
    fn test_database_url_without_postgres_feature() {
        let err = StoreConfig::from_lookup(lookup(&[(
            "DATABASE_URL",
            "postgres://loyal:pw@db.internal:6432/analytics",
        )]))
        .unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Configuration);
        assert!(err.to_string().contains("postgres feature"));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "Yes").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }
}
