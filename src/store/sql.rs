//! MySQL statement text for table creation and upserts.

use crate::schema::{ColumnSpec, ColumnType};

/// MySQL limit for table, column and database names
const MAX_IDENTIFIER_LEN: usize = 64;

/// Check that a name can be used as a quoted MySQL identifier
pub fn validate_identifier(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name is empty".to_string());
    }
    if name.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(format!(
            "'{}' is longer than {} characters",
            name, MAX_IDENTIFIER_LEN
        ));
    }
    if name.contains('\0') {
        return Err(format!("'{}' contains a NUL character", name.escape_default()));
    }
    if name.ends_with(' ') {
        return Err(format!("'{}' ends with a space", name));
    }
    Ok(())
}

/// Backtick-quote an identifier, doubling embedded backticks
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

pub fn column_type_sql(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Identifier => "VARCHAR(255) PRIMARY KEY",
        ColumnType::Int => "BIGINT",
        ColumnType::Float => "DOUBLE",
        ColumnType::Text => "LONGTEXT",
    }
}

pub fn create_database_sql(database: &str) -> String {
    format!(
        "CREATE DATABASE IF NOT EXISTS {} CHARACTER SET utf8mb4",
        quote_identifier(database)
    )
}

/// `CREATE TABLE IF NOT EXISTS` with one column per spec entry, in spec order
pub fn create_table_sql(table: &str, spec: &ColumnSpec) -> String {
    let columns = spec
        .columns()
        .iter()
        .map(|c| format!("{} {}", quote_identifier(&c.name), column_type_sql(c.ty)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({}) CHARACTER SET utf8mb4",
        quote_identifier(table),
        columns
    )
}

/// Single-row insert that overwrites every non-key column on a key conflict.
///
/// Placeholders follow spec order.
pub fn upsert_sql(table: &str, spec: &ColumnSpec) -> String {
    let columns = spec
        .names()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; spec.len()].join(", ");

    let mut updates = spec
        .columns()
        .iter()
        .filter(|c| c.ty != ColumnType::Identifier)
        .map(|c| {
            let column = quote_identifier(&c.name);
            format!("{} = VALUES({})", column, column)
        })
        .collect::<Vec<_>>();

    // A key-only table still needs an update clause to ignore duplicates
    if updates.is_empty() {
        let key = spec
            .columns()
            .iter()
            .find(|c| c.ty == ColumnType::Identifier)
            .map(|c| quote_identifier(&c.name))
            .unwrap_or_else(|| quote_identifier(crate::flatten::ID_COLUMN));
        updates.push(format!("{} = {}", key, key));
    }

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
        quote_identifier(table),
        columns,
        placeholders,
        updates.join(", ")
    )
}
