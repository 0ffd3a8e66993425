//! PostgreSQL backend implementation for shelfwatch-rdbc
//!
//! Provides PostgreSQL-specific implementations:
//! - Connection and transaction on top of tokio-postgres
//! - Coercing parameter binding driven by the prepared statement's types
//! - SQLSTATE-based error classification

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_postgres::types::{IsNull, ToSql, Type};
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionConfig, ConnectionFactory, Transaction};
use crate::error::{Error, Result};
use crate::types::{ResultSet, Row, Value};

type BoxError = Box<dyn std::error::Error + Sync + Send>;
type BindResult = std::result::Result<IsNull, BoxError>;

// ============================================================================
// Parameter binding
// ============================================================================

/// A [`Value`] bound to whatever type the server inferred for its parameter.
///
/// Integers fit any integer, float or numeric column, floats fit integer
/// columns when they carry no fraction, and strings are parsed for temporal,
/// uuid, json and numeric columns. `Null` binds to anything.
#[derive(Debug)]
pub struct PgParam<'a>(pub &'a Value);

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> BindResult {
        bind_value(self.0, ty, out)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn is_text(ty: &Type) -> bool {
    <&str as ToSql>::accepts(ty)
}

fn mismatch(value: &Value, ty: &Type) -> BoxError {
    format!("cannot bind {} value to column of type {}", value.sql_type(), ty).into()
}

fn bind_value(value: &Value, ty: &Type, out: &mut BytesMut) -> BindResult {
    match value {
        Value::Null => Ok(IsNull::Yes),
        Value::Bool(b) => match *ty {
            Type::BOOL => b.to_sql_checked(ty, out),
            _ if is_text(ty) => b.to_string().to_sql_checked(ty, out),
            _ => Err(mismatch(value, ty)),
        },
        Value::Int16(n) => bind_int(i64::from(*n), value, ty, out),
        Value::Int32(n) => bind_int(i64::from(*n), value, ty, out),
        Value::Int64(n) => bind_int(*n, value, ty, out),
        Value::Float32(n) => bind_float(f64::from(*n), value, ty, out),
        Value::Float64(n) => bind_float(*n, value, ty, out),
        Value::Decimal(d) => bind_decimal(*d, value, ty, out),
        Value::String(s) => bind_text(s, value, ty, out),
        Value::Date(d) => match *ty {
            Type::DATE => d.to_sql_checked(ty, out),
            Type::TIMESTAMP => d.and_time(NaiveTime::MIN).to_sql_checked(ty, out),
            Type::TIMESTAMPTZ => d.and_time(NaiveTime::MIN).and_utc().to_sql_checked(ty, out),
            _ if is_text(ty) => d.to_string().to_sql_checked(ty, out),
            _ => Err(mismatch(value, ty)),
        },
        Value::Time(t) => match *ty {
            Type::TIME => t.to_sql_checked(ty, out),
            _ if is_text(ty) => t.to_string().to_sql_checked(ty, out),
            _ => Err(mismatch(value, ty)),
        },
        Value::DateTime(dt) => match *ty {
            Type::TIMESTAMP => dt.to_sql_checked(ty, out),
            Type::TIMESTAMPTZ => dt.and_utc().to_sql_checked(ty, out),
            Type::DATE => dt.date().to_sql_checked(ty, out),
            _ if is_text(ty) => dt.to_string().to_sql_checked(ty, out),
            _ => Err(mismatch(value, ty)),
        },
        Value::DateTimeTz(dt) => match *ty {
            Type::TIMESTAMPTZ => dt.to_sql_checked(ty, out),
            Type::TIMESTAMP => dt.naive_utc().to_sql_checked(ty, out),
            Type::DATE => dt.date_naive().to_sql_checked(ty, out),
            _ if is_text(ty) => dt.to_rfc3339().to_sql_checked(ty, out),
            _ => Err(mismatch(value, ty)),
        },
        Value::Uuid(u) => match *ty {
            Type::UUID => u.to_sql_checked(ty, out),
            _ if is_text(ty) => u.to_string().to_sql_checked(ty, out),
            _ => Err(mismatch(value, ty)),
        },
        Value::Json(j) => match *ty {
            Type::JSON | Type::JSONB => j.to_sql_checked(ty, out),
            _ if is_text(ty) => j.to_string().to_sql_checked(ty, out),
            _ => Err(mismatch(value, ty)),
        },
    }
}

fn bind_int(n: i64, value: &Value, ty: &Type, out: &mut BytesMut) -> BindResult {
    match *ty {
        Type::INT2 => i16::try_from(n)?.to_sql_checked(ty, out),
        Type::INT4 => i32::try_from(n)?.to_sql_checked(ty, out),
        Type::INT8 => n.to_sql_checked(ty, out),
        Type::FLOAT4 => (n as f32).to_sql_checked(ty, out),
        Type::FLOAT8 => (n as f64).to_sql_checked(ty, out),
        Type::NUMERIC => Decimal::from(n).to_sql_checked(ty, out),
        _ if is_text(ty) => n.to_string().to_sql_checked(ty, out),
        _ => Err(mismatch(value, ty)),
    }
}

fn bind_float(f: f64, value: &Value, ty: &Type, out: &mut BytesMut) -> BindResult {
    match *ty {
        Type::FLOAT4 => (f as f32).to_sql_checked(ty, out),
        Type::FLOAT8 => f.to_sql_checked(ty, out),
        Type::NUMERIC => Decimal::from_f64_retain(f)
            .ok_or_else(|| mismatch(value, ty))?
            .normalize()
            .to_sql_checked(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 if f.is_finite() && f.fract() == 0.0 => {
            let n = i64::from_f64(f).ok_or_else(|| mismatch(value, ty))?;
            bind_int(n, value, ty, out)
        }
        _ if is_text(ty) => f.to_string().to_sql_checked(ty, out),
        _ => Err(mismatch(value, ty)),
    }
}

fn bind_decimal(d: Decimal, value: &Value, ty: &Type, out: &mut BytesMut) -> BindResult {
    match *ty {
        Type::NUMERIC => d.to_sql_checked(ty, out),
        Type::FLOAT4 | Type::FLOAT8 => {
            let f = d.to_f64().ok_or_else(|| mismatch(value, ty))?;
            bind_float(f, value, ty, out)
        }
        Type::INT2 | Type::INT4 | Type::INT8 if d.fract().is_zero() => {
            let n = d.to_i64().ok_or_else(|| mismatch(value, ty))?;
            bind_int(n, value, ty, out)
        }
        _ if is_text(ty) => d.to_string().to_sql_checked(ty, out),
        _ => Err(mismatch(value, ty)),
    }
}

fn bind_text(s: &str, value: &Value, ty: &Type, out: &mut BytesMut) -> BindResult {
    if is_text(ty) {
        return s.to_sql_checked(ty, out);
    }
    let s = s.trim();
    match *ty {
        Type::BOOL => Value::String(s.to_string())
            .as_bool()
            .ok_or_else(|| mismatch(value, ty))?
            .to_sql_checked(ty, out),
        Type::INT2 => s.parse::<i16>()?.to_sql_checked(ty, out),
        Type::INT4 => s.parse::<i32>()?.to_sql_checked(ty, out),
        Type::INT8 => s.parse::<i64>()?.to_sql_checked(ty, out),
        Type::FLOAT4 => s.parse::<f32>()?.to_sql_checked(ty, out),
        Type::FLOAT8 => s.parse::<f64>()?.to_sql_checked(ty, out),
        Type::NUMERIC => Decimal::from_str(s)?.to_sql_checked(ty, out),
        Type::DATE => parse_date(s)
            .ok_or_else(|| mismatch(value, ty))?
            .to_sql_checked(ty, out),
        Type::TIME => NaiveTime::parse_from_str(s, "%H:%M:%S%.f")?.to_sql_checked(ty, out),
        Type::TIMESTAMP => parse_timestamp(s)
            .ok_or_else(|| mismatch(value, ty))?
            .to_sql_checked(ty, out),
        Type::TIMESTAMPTZ => parse_timestamptz(s)
            .ok_or_else(|| mismatch(value, ty))?
            .to_sql_checked(ty, out),
        Type::UUID => uuid::Uuid::parse_str(s)?.to_sql_checked(ty, out),
        Type::JSON | Type::JSONB => {
            serde_json::from_str::<serde_json::Value>(s)?.to_sql_checked(ty, out)
        }
        _ => Err(mismatch(value, ty)),
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(s).map(|dt| dt.date()))
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .or_else(|| parse_timestamptz(s).map(|dt| dt.naive_utc()))
}

fn parse_timestamptz(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .or_else(|| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z").ok())
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.and_utc())
        })
}

// ============================================================================
// Error classification
// ============================================================================

/// Classify a tokio-postgres error by SQLSTATE, or by its client-side cause
pub fn map_pg_error(e: tokio_postgres::Error, sql: Option<&str>) -> Error {
    if let Some(db) = e.as_db_error() {
        let code = db.code().code().to_string();
        let message = db.message().to_string();
        let constraint = db.constraint().map(str::to_string);
        let class = code.get(..2).unwrap_or_default();
        return match (class, code.as_str()) {
            (_, "57014") => Error::timeout(message),
            ("08" | "53" | "57", _) => Error::connection_with_source(message, e),
            (_, "40001" | "40P01") => Error::deadlock(message),
            ("23", _) => Error::constraint(constraint.unwrap_or(code), message),
            ("28", _) => Error::authentication(message),
            ("3D", _) => Error::config(message),
            _ => Error::Query {
                message: format!("{message} (SQLSTATE {code})"),
                sql: sql.map(str::to_string),
                source: Some(Box::new(e)),
            },
        };
    }

    let io_source = std::error::Error::source(&e)
        .is_some_and(|source| source.downcast_ref::<std::io::Error>().is_some());

    if e.is_closed() || io_source {
        return Error::connection_with_source(e.to_string(), e);
    }

    if std::error::Error::source(&e).is_some() {
        return Error::type_conversion(e.to_string());
    }

    Error::Query {
        message: e.to_string(),
        sql: sql.map(str::to_string),
        source: Some(Box::new(e)),
    }
}

// ============================================================================
// Row decoding
// ============================================================================

fn pg_row_to_row(columns: &[String], pg_row: &tokio_postgres::Row) -> Row {
    let values = pg_row
        .columns()
        .iter()
        .enumerate()
        .map(|(i, col)| pg_value_to_value(pg_row, i, col.type_()))
        .collect();
    Row::new(columns.to_vec(), values)
}

fn get<'a, T>(row: &'a tokio_postgres::Row, idx: usize, wrap: impl FnOnce(T) -> Value) -> Value
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get::<_, Option<T>>(idx)
        .ok()
        .flatten()
        .map(wrap)
        .unwrap_or(Value::Null)
}

fn pg_value_to_value(row: &tokio_postgres::Row, idx: usize, pg_type: &Type) -> Value {
    match *pg_type {
        Type::BOOL => get(row, idx, Value::Bool),
        Type::INT2 => get(row, idx, Value::Int16),
        Type::INT4 => get(row, idx, Value::Int32),
        Type::INT8 => get(row, idx, Value::Int64),
        Type::FLOAT4 => get(row, idx, Value::Float32),
        Type::FLOAT8 => get(row, idx, Value::Float64),
        Type::NUMERIC => get(row, idx, Value::Decimal),
        Type::DATE => get(row, idx, Value::Date),
        Type::TIME => get(row, idx, Value::Time),
        Type::TIMESTAMP => get(row, idx, Value::DateTime),
        Type::TIMESTAMPTZ => get(row, idx, Value::DateTimeTz),
        Type::UUID => get(row, idx, Value::Uuid),
        Type::JSON | Type::JSONB => get(row, idx, Value::Json),
        // text types, and a best effort for anything else
        _ => get(row, idx, Value::String),
    }
}

async fn run_query(
    client: &tokio_postgres::Client,
    sql: &str,
    params: &[Value],
) -> Result<ResultSet> {
    let statement = client
        .prepare(sql)
        .await
        .map_err(|e| map_pg_error(e, Some(sql)))?;
    let columns: Vec<String> = statement
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let bound: Vec<PgParam<'_>> = params.iter().map(PgParam).collect();
    let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
    let pg_rows = client
        .query(&statement, &refs)
        .await
        .map_err(|e| map_pg_error(e, Some(sql)))?;

    let rows = pg_rows.iter().map(|r| pg_row_to_row(&columns, r)).collect();
    Ok(ResultSet::new(columns, rows))
}

async fn run_execute(client: &tokio_postgres::Client, sql: &str, params: &[Value]) -> Result<u64> {
    let bound: Vec<PgParam<'_>> = params.iter().map(PgParam).collect();
    let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
    client
        .execute(sql, &refs)
        .await
        .map_err(|e| map_pg_error(e, Some(sql)))
}

async fn run_execute_many(
    client: &tokio_postgres::Client,
    sql: &str,
    rows: &[Vec<Value>],
) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }
    let statement = client
        .prepare(sql)
        .await
        .map_err(|e| map_pg_error(e, Some(sql)))?;

    let mut affected = 0;
    for params in rows {
        let bound: Vec<PgParam<'_>> = params.iter().map(PgParam).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        affected += client
            .execute(&statement, &refs)
            .await
            .map_err(|e| map_pg_error(e, Some(sql)))?;
    }
    Ok(affected)
}

// ============================================================================
// Connection / transaction
// ============================================================================

/// PostgreSQL connection implementation
pub struct PgConnection {
    client: Arc<tokio_postgres::Client>,
    closed: AtomicBool,
    tx_open: Arc<AtomicBool>,
}

impl PgConnection {
    /// Create a new connection from a tokio-postgres client
    pub fn new(client: tokio_postgres::Client) -> Self {
        Self {
            client: Arc::new(client),
            closed: AtomicBool::new(false),
            tx_open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get the underlying client
    pub fn client(&self) -> &tokio_postgres::Client {
        &self.client
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) || self.client.is_closed() {
            return Err(Error::connection("connection is closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for PgConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        self.ensure_open()?;
        run_query(&self.client, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.ensure_open()?;
        run_execute(&self.client, sql, params).await
    }

    async fn execute_many(&self, sql: &str, rows: &[Vec<Value>]) -> Result<u64> {
        self.ensure_open()?;
        run_execute_many(&self.client, sql, rows).await
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        self.ensure_open()?;
        if self.tx_open.swap(true, Ordering::AcqRel) {
            return Err(Error::transaction("a transaction is already open on this connection"));
        }

        if let Err(e) = self.client.batch_execute("BEGIN").await {
            self.tx_open.store(false, Ordering::Release);
            return Err(match map_pg_error(e, Some("BEGIN")) {
                err if err.is_retriable() => err,
                err => Error::transaction(err.to_string()),
            });
        }

        Ok(Box::new(PgTransaction {
            client: Arc::clone(&self.client),
            tx_open: Arc::clone(&self.tx_open),
        }))
    }

    fn in_transaction(&self) -> bool {
        self.tx_open.load(Ordering::Acquire)
    }

    async fn is_valid(&self) -> bool {
        if self.ensure_open().is_err() {
            return false;
        }
        self.client.simple_query("SELECT 1").await.is_ok()
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// PostgreSQL transaction
///
/// Shares the session with the connection it was opened on. Until `commit`
/// or `rollback` succeeds the connection reports `in_transaction`, so the
/// pool closes it rather than reuse it.
pub struct PgTransaction {
    client: Arc<tokio_postgres::Client>,
    tx_open: Arc<AtomicBool>,
}

impl PgTransaction {
    async fn finish(&self, sql: &str) -> Result<()> {
        self.client
            .batch_execute(sql)
            .await
            .map_err(|e| finish_error(map_pg_error(e, Some(sql))))?;
        self.tx_open.store(false, Ordering::Release);
        Ok(())
    }
}

/// COMMIT/ROLLBACK failure. Connectivity errors and deferred constraint
/// violations keep their category.
fn finish_error(err: Error) -> Error {
    if err.is_retriable() || err.is_integrity() {
        err
    } else {
        Error::transaction(err.to_string())
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        run_query(&self.client, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        run_execute(&self.client, sql, params).await
    }

    async fn execute_many(&self, sql: &str, rows: &[Vec<Value>]) -> Result<u64> {
        run_execute_many(&self.client, sql, rows).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}

/// PostgreSQL connection factory
#[derive(Debug, Clone, Default)]
pub struct PgConnectionFactory;

impl PgConnectionFactory {
    fn pg_config(config: &ConnectionConfig) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .user(&config.user)
            .dbname(&config.database)
            .connect_timeout(config.connect_timeout);
        if !config.password.is_empty() {
            pg.password(&config.password);
        }
        if let Some(name) = &config.application_name {
            pg.application_name(name);
        }
        pg
    }
}

#[async_trait]
impl ConnectionFactory for PgConnectionFactory {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        let (client, connection) = Self::pg_config(config)
            .connect(tokio_postgres::NoTls)
            .await
            .map_err(|e| match map_pg_error(e, None) {
                err @ (Error::Authentication { .. } | Error::Configuration { .. }) => err,
                err => Error::Connection {
                    message: format!(
                        "failed to connect to {}:{}/{}: {}",
                        config.host, config.port, config.database, err
                    ),
                    source: Some(Box::new(err)),
                },
            })?;

        let host = config.host.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(host = %host, error = %e, "PostgreSQL connection terminated");
            }
        });

        debug!(host = %config.host, database = %config.database, "Opened PostgreSQL connection");
        Ok(Box::new(PgConnection::new(client)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_finish_error_keeps_deferred_constraint() {
        let err = finish_error(Error::constraint(
            "shelf_fill_events_store_fk",
            "insert or update violates foreign key constraint",
        ));
        assert!(err.is_integrity());
        assert!(!err.is_retriable());

        assert!(finish_error(Error::connection("reset")).is_retriable());
        assert_eq!(
            finish_error(Error::query("syntax error")).category(),
            ErrorCategory::Transaction
        );
    }

    fn bind(value: Value, ty: &Type) -> BindResult {
        let mut buf = BytesMut::new();
        PgParam(&value).to_sql_checked(ty, &mut buf)
    }

    #[test]
    fn test_null_binds_to_any_type() {
        for ty in [Type::INT4, Type::TEXT, Type::TIMESTAMP, Type::NUMERIC, Type::JSONB] {
            assert!(matches!(bind(Value::Null, &ty), Ok(IsNull::Yes)));
        }
    }

    #[test]
    fn test_integer_coercion() {
        assert!(bind(Value::Int32(7), &Type::INT8).is_ok());
        assert!(bind(Value::Int64(7), &Type::INT2).is_ok());
        assert!(bind(Value::Int64(i64::MAX), &Type::INT4).is_err());
        assert!(bind(Value::Int32(7), &Type::FLOAT8).is_ok());
        assert!(bind(Value::Int32(7), &Type::NUMERIC).is_ok());
        assert!(bind(Value::Int32(7), &Type::UUID).is_err());
    }

    #[test]
    fn test_float_coercion() {
        assert!(bind(Value::Float64(42.5), &Type::FLOAT4).is_ok());
        assert!(bind(Value::Float64(42.5), &Type::NUMERIC).is_ok());
        assert!(bind(Value::Float64(42.0), &Type::INT4).is_ok());
        assert!(bind(Value::Float64(42.5), &Type::INT4).is_err());
        assert!(bind(Value::Float64(f64::NAN), &Type::NUMERIC).is_err());
    }

    #[test]
    fn test_string_coercion() {
        assert!(bind(Value::from("2026-01-01T00:00:00"), &Type::TIMESTAMP).is_ok());
        assert!(bind(Value::from("2026-01-01 08:30:00"), &Type::TIMESTAMPTZ).is_ok());
        assert!(bind(Value::from("2026-01-01T08:30:00+03:00"), &Type::TIMESTAMPTZ).is_ok());
        assert!(bind(Value::from("2026-01-01"), &Type::DATE).is_ok());
        assert!(bind(Value::from("12"), &Type::INT4).is_ok());
        assert!(bind(Value::from("12.75"), &Type::NUMERIC).is_ok());
        assert!(bind(Value::from("{\"a\":1}"), &Type::JSONB).is_ok());
        assert!(bind(Value::from("not a date"), &Type::TIMESTAMP).is_err());
        assert!(bind(
            Value::from("67e55044-10b1-426f-9247-bb680e5fe0c8"),
            &Type::UUID
        )
        .is_ok());
    }

    #[test]
    fn test_text_accepts_scalars() {
        assert!(bind(Value::Int32(1), &Type::TEXT).is_ok());
        assert!(bind(Value::Bool(true), &Type::VARCHAR).is_ok());
        assert!(bind(Value::from("x"), &Type::TEXT).is_ok());
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert!(parse_timestamp("2026-01-01T00:00:00").is_some());
        assert!(parse_timestamp("2026-01-01 00:00:00.123").is_some());
        assert!(parse_timestamp("2026-01-01").is_some());
        assert!(parse_timestamp("2026-01-01T00:00:00Z").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_pg_config_from_connection_config() {
        let config = ConnectionConfig::new("db.internal", "loyal")
            .with_port(6432)
            .with_password("pw")
            .with_database("telegram_bots");
        let pg = PgConnectionFactory::pg_config(&config);
        assert_eq!(pg.get_ports(), &[6432]);
        assert_eq!(pg.get_user(), Some("loyal"));
        assert_eq!(pg.get_dbname(), Some("telegram_bots"));
        assert_eq!(pg.get_password(), Some(&b"pw"[..]));
    }
}
