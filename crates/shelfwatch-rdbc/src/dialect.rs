//! Statement generation for the bulk writer
//!
//! Uses sea-query for type-safe statement building. Every statement binds
//! the batch columns positionally: `$i` is always the i-th column of the
//! batch, so one parameter row per record serves every write mode.
//!
//! - Insert: plain `INSERT ... VALUES`
//! - Upsert: `INSERT ... ON CONFLICT (keys) DO UPDATE SET` non-key columns
//! - InsertIfAbsent: `INSERT ... SELECT ... WHERE NOT EXISTS` keyed lookup
//! - UpdateOnly: `UPDATE ... SET` non-key columns `WHERE` keys match

use sea_query::{
    Alias, Expr, IntoIden, OnConflict, PostgresQueryBuilder, Query, SimpleExpr, TableRef,
};

use crate::error::{Error, Result};
use crate::record::Batch;
use crate::security::split_table_name;
use crate::writer::WriteMode;

// ---------------------------------------------------------------------------
// Helper: build a sea-query TableRef from optional schema + table name
// ---------------------------------------------------------------------------

fn sea_table_ref(schema: Option<&str>, table: &str) -> TableRef {
    match schema {
        Some(s) => TableRef::SchemaTable(Alias::new(s).into_iden(), Alias::new(table).into_iden()),
        None => TableRef::Table(Alias::new(table).into_iden()),
    }
}

fn param(index: usize) -> SimpleExpr {
    Expr::cust(format!("${}", index))
}

/// SQL dialect for statement generation
pub trait SqlDialect: Send + Sync {
    /// Get the dialect name
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column name)
    fn quote_identifier(&self, name: &str) -> String;

    /// Get the placeholder for a 1-based parameter index
    fn placeholder(&self, index: usize) -> String;

    /// Unconditional insert of one record
    fn insert_sql(&self, batch: &Batch) -> Result<String>;

    /// Insert or overwrite the non-key columns on key collision
    fn upsert_sql(&self, batch: &Batch) -> Result<String>;

    /// Insert only when no row with the same key exists
    fn insert_if_absent_sql(&self, batch: &Batch) -> Result<String>;

    /// Update the non-key columns of the row with the same key
    fn update_sql(&self, batch: &Batch) -> Result<String>;

    /// Statement for a write mode
    fn write_sql(&self, mode: WriteMode, batch: &Batch) -> Result<String> {
        match mode {
            WriteMode::Insert => self.insert_sql(batch),
            WriteMode::Upsert => self.upsert_sql(batch),
            WriteMode::InsertIfAbsent => self.insert_if_absent_sql(batch),
            WriteMode::UpdateOnly => self.update_sql(batch),
        }
    }
}

// ===========================================================================
// PostgreSQL
// ===========================================================================

/// PostgreSQL dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    fn table(batch: &Batch) -> Result<TableRef> {
        let (schema, table) = split_table_name(batch.table())?;
        Ok(sea_table_ref(schema, table))
    }

    fn require_keys(batch: &Batch, mode: WriteMode) -> Result<()> {
        if batch.conflict_keys().is_empty() {
            return Err(Error::invalid_batch(format!(
                "{} into '{}' needs at least one conflict key",
                mode,
                batch.table()
            )));
        }
        Ok(())
    }

    /// `key1 = $i AND key2 = $j`, with `$n` the key's position in the batch
    fn key_conditions(batch: &Batch) -> Vec<SimpleExpr> {
        batch
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| batch.conflict_keys().contains(c))
            .map(|(i, c)| Expr::col(Alias::new(c.as_str())).eq(param(i + 1)))
            .collect()
    }
}

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn insert_sql(&self, batch: &Batch) -> Result<String> {
        let col_idens: Vec<_> = batch
            .columns()
            .iter()
            .map(|c| Alias::new(c.as_str()).into_iden())
            .collect();
        let values: Vec<_> = (1..=batch.columns().len()).map(param).collect();

        let mut stmt = Query::insert();
        stmt.into_table(Self::table(batch)?)
            .columns(col_idens)
            .values(values)
            .map_err(|e| Error::invalid_batch(e.to_string()))?;

        Ok(stmt.to_string(PostgresQueryBuilder))
    }

    fn upsert_sql(&self, batch: &Batch) -> Result<String> {
        Self::require_keys(batch, WriteMode::Upsert)?;

        let col_idens: Vec<_> = batch
            .columns()
            .iter()
            .map(|c| Alias::new(c.as_str()).into_iden())
            .collect();
        let update_cols: Vec<_> = batch
            .non_key_columns()
            .map(|c| Alias::new(c.as_str()).into_iden())
            .collect();
        let pk_idens: Vec<_> = batch
            .conflict_keys()
            .iter()
            .map(|c| Alias::new(c.as_str()).into_iden())
            .collect();
        let values: Vec<_> = (1..=batch.columns().len()).map(param).collect();

        let mut on_conflict = OnConflict::columns(pk_idens);
        if update_cols.is_empty() {
            on_conflict.do_nothing();
        } else {
            on_conflict.update_columns(update_cols);
        }

        let mut stmt = Query::insert();
        stmt.into_table(Self::table(batch)?)
            .columns(col_idens)
            .values(values)
            .map_err(|e| Error::invalid_batch(e.to_string()))?
            .on_conflict(on_conflict.to_owned());

        Ok(stmt.to_string(PostgresQueryBuilder))
    }

    fn insert_if_absent_sql(&self, batch: &Batch) -> Result<String> {
        Self::require_keys(batch, WriteMode::InsertIfAbsent)?;

        let (schema, table) = split_table_name(batch.table())?;

        let mut existing = Query::select();
        existing.expr(Expr::cust("1")).from(sea_table_ref(schema, table));
        for cond in Self::key_conditions(batch) {
            existing.and_where(cond);
        }

        let mut source = Query::select();
        source
            .exprs((1..=batch.columns().len()).map(param))
            .and_where(Expr::exists(existing).not());

        let col_idens: Vec<_> = batch
            .columns()
            .iter()
            .map(|c| Alias::new(c.as_str()).into_iden())
            .collect();

        let mut stmt = Query::insert();
        stmt.into_table(sea_table_ref(schema, table))
            .columns(col_idens)
            .select_from(source)
            .map_err(|e| Error::invalid_batch(e.to_string()))?;

        Ok(stmt.to_string(PostgresQueryBuilder))
    }

    fn update_sql(&self, batch: &Batch) -> Result<String> {
        Self::require_keys(batch, WriteMode::UpdateOnly)?;

        let assignments: Vec<_> = batch
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| !batch.conflict_keys().contains(c))
            .map(|(i, c)| (Alias::new(c.as_str()), param(i + 1)))
            .collect();

        if assignments.is_empty() {
            return Err(Error::invalid_batch(format!(
                "update of '{}' has no non-key columns to set",
                batch.table()
            )));
        }

        let mut stmt = Query::update();
        stmt.table(Self::table(batch)?).values(assignments);
        for cond in Self::key_conditions(batch) {
            stmt.and_where(cond);
        }

        Ok(stmt.to_string(PostgresQueryBuilder))
    }
}
