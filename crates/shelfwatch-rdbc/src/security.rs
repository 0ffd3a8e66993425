//! Identifier checks for the table and column names that batches carry.
//!
//! Table and column names are spliced into statement text (quoted), never
//! bound as parameters. They must come from the caller's own code, not from
//! end users. These checks reject anything that is not a plain identifier
//! so a mistake at a call site fails loudly instead of producing odd SQL.

use crate::error::Error;

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1)
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Validate a column (or schema/table part) name.
///
/// Must match `^[A-Za-z_][A-Za-z0-9_]{0,62}$`.
///
/// # Examples
///
/// ```
/// use shelfwatch_rdbc::security::validate_identifier;
///
/// assert!(validate_identifier("fill_pct").is_ok());
/// assert!(validate_identifier("_private").is_ok());
///
/// assert!(validate_identifier("x; DROP TABLE shelf_fill_events--").is_err());
/// assert!(validate_identifier("").is_err());
/// assert!(validate_identifier("1st").is_err());
/// ```
pub fn validate_identifier(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_batch("identifier cannot be empty"));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::invalid_batch(format!(
            "identifier too long: {} chars (max {})",
            name.len(),
            MAX_IDENTIFIER_LEN
        )));
    }

    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => {
            return Err(Error::invalid_batch(format!(
                "invalid identifier '{}': must start with a letter or underscore",
                name
            )));
        }
    }

    if let Some(c) = chars.find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(Error::invalid_batch(format!(
            "invalid identifier '{}': contains invalid character '{}'",
            name, c
        )));
    }

    Ok(())
}

/// Split `schema.table` (or a bare `table`) and validate both parts.
///
/// ```
/// use shelfwatch_rdbc::security::split_table_name;
///
/// assert_eq!(split_table_name("public.store_entrances").unwrap(), (Some("public"), "store_entrances"));
/// assert_eq!(split_table_name("store_entrances").unwrap(), (None, "store_entrances"));
/// assert!(split_table_name("a.b.c").is_err());
/// ```
pub fn split_table_name(name: &str) -> crate::Result<(Option<&str>, &str)> {
    let mut parts = name.split('.');
    let (schema, table) = match (parts.next(), parts.next(), parts.next()) {
        (Some(table), None, None) => (None, table),
        (Some(schema), Some(table), None) => (Some(schema), table),
        _ => {
            return Err(Error::invalid_batch(format!(
                "invalid table name '{}': expected 'table' or 'schema.table'",
                name
            )))
        }
    };

    if let Some(schema) = schema {
        validate_identifier(schema)?;
    }
    validate_identifier(table)?;
    Ok((schema, table))
}
