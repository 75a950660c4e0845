pub mod mysql;
pub mod sql;

use async_trait::async_trait;
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};

use crate::cli::ExtraColumns;
use crate::error::EtlError;
use crate::flatten::{FieldValue, FlatRow};
use crate::schema::ColumnSpec;

pub use self::mysql::MySqlStore;

/// A relational target with one table per index
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Create the table if it does not exist. An existing table is left untouched.
    async fn create_table(&self, table: &str, spec: &ColumnSpec) -> Result<(), sqlx::Error>;

    /// Insert or update a batch of rows in a single transaction.
    ///
    /// Each row holds one value per spec column, in spec order.
    async fn write_batch(
        &self,
        table: &str,
        spec: &ColumnSpec,
        rows: &[Vec<FieldValue>],
    ) -> Result<(), sqlx::Error>;
}

/// Make sure the table for an index exists with the given columns
pub async fn ensure_table<T: TableStore + ?Sized>(
    store: &T,
    table: &str,
    spec: &ColumnSpec,
) -> Result<(), EtlError> {
    sql::validate_identifier(table)
        .map_err(|reason| EtlError::schema(table, format!("table name: {}", reason)))?;
    // MySQL compares column names without regard to case
    let mut seen: HashMap<String, &str> = HashMap::new();
    for name in spec.names() {
        sql::validate_identifier(name)
            .map_err(|reason| EtlError::schema(table, format!("column name: {}", reason)))?;
        if let Some(first) = seen.insert(name.to_lowercase(), name) {
            return Err(EtlError::schema(
                table,
                format!("columns '{}' and '{}' differ only by case", first, name),
            ));
        }
    }

    store
        .create_table(table, spec)
        .await
        .map_err(|source| EtlError::Storage {
            table: table.to_string(),
            source,
        })?;

    debug!("{}: table ready with {} columns", table, spec.len());
    Ok(())
}

/// Counters from one upsert call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub written: u64,
    /// Rows left out under [`ExtraColumns::SkipRow`]
    pub skipped: u64,
    /// Columns whose values were dropped under [`ExtraColumns::Drop`]
    pub dropped_columns: Vec<String>,
    /// Columns where a value of the wrong type was written as NULL under [`ExtraColumns::Drop`]
    pub nulled_columns: Vec<String>,
}

/// Align rows to the spec.
///
/// Missing columns become NULL. Values outside the spec, either in an unknown
/// column or of a type the column cannot hold, follow `policy`: dropped
/// (conflicting values become NULL), the whole row skipped, or an error.
pub fn conform_rows(
    table: &str,
    spec: &ColumnSpec,
    rows: &[FlatRow],
    policy: ExtraColumns,
) -> Result<(Vec<Vec<FieldValue>>, UpsertOutcome), EtlError> {
    let mut aligned = Vec::with_capacity(rows.len());
    let mut outcome = UpsertOutcome::default();
    let mut dropped = BTreeSet::new();
    let mut nulled = BTreeSet::new();

    for row in rows {
        let extra: Vec<String> = row
            .iter()
            .filter(|(name, _)| !spec.contains(name))
            .map(|(name, _)| name.to_string())
            .collect();
        let conflicts: Vec<(&str, &FieldValue)> = row
            .iter()
            .filter(|(name, value)| spec.get(name).is_some_and(|ty| !ty.accepts(value)))
            .collect();

        match policy {
            ExtraColumns::Fail => {
                if !extra.is_empty() {
                    return Err(EtlError::ExtraColumns {
                        table: table.to_string(),
                        id: row.id().to_string(),
                        columns: extra,
                    });
                }
                if let Some((column, value)) = conflicts.first() {
                    let expected = spec.get(column).map(|ty| ty.to_string()).unwrap_or_default();
                    return Err(EtlError::TypeConflict {
                        table: table.to_string(),
                        id: row.id().to_string(),
                        column: column.to_string(),
                        expected,
                        found: value.kind(),
                    });
                }
            }
            ExtraColumns::SkipRow if !extra.is_empty() || !conflicts.is_empty() => {
                let mut reasons = extra;
                reasons.extend(conflicts.iter().map(|(name, value)| {
                    format!("{} ({} value)", name, value.kind())
                }));
                warn!(
                    "{}: skipping row '{}' with values outside the table: {}",
                    table,
                    row.id(),
                    reasons.join(", ")
                );
                outcome.skipped += 1;
                continue;
            }
            ExtraColumns::SkipRow => {}
            ExtraColumns::Drop => {
                dropped.extend(extra);
                nulled.extend(conflicts.iter().map(|(name, _)| name.to_string()));
            }
        }

        let values = spec
            .columns()
            .iter()
            .map(|column| match row.get(&column.name) {
                Some(value) if column.ty.accepts(value) => value.clone(),
                _ => FieldValue::Null,
            })
            .collect();
        aligned.push(values);
    }

    if !dropped.is_empty() {
        warn!(
            "{}: dropped values of columns not in the table: {}",
            table,
            dropped.iter().cloned().collect::<Vec<_>>().join(", ")
        );
    }
    if !nulled.is_empty() {
        warn!(
            "{}: wrote NULL for values not matching the column type in: {}",
            table,
            nulled.iter().cloned().collect::<Vec<_>>().join(", ")
        );
    }
    outcome.dropped_columns = dropped.into_iter().collect();
    outcome.nulled_columns = nulled.into_iter().collect();

    Ok((aligned, outcome))
}

/// Write rows in consecutive batches of at most `batch_size`.
///
/// Batches commit one at a time; a failed batch leaves earlier ones in place.
pub async fn upsert<T: TableStore + ?Sized>(
    store: &T,
    table: &str,
    spec: &ColumnSpec,
    rows: &[FlatRow],
    batch_size: usize,
    policy: ExtraColumns,
) -> Result<UpsertOutcome, EtlError> {
    let (aligned, mut outcome) = conform_rows(table, spec, rows, policy)?;

    for (batch, chunk) in aligned.chunks(batch_size.max(1)).enumerate() {
        store
            .write_batch(table, spec, chunk)
            .await
            .map_err(|source| EtlError::Persistence {
                table: table.to_string(),
                batch: batch + 1,
                committed: outcome.written,
                source,
            })?;
        outcome.written += chunk.len() as u64;
        debug!(
            "{}: committed batch {} ({} rows so far)",
            table,
            batch + 1,
            outcome.written
        );
    }

    Ok(outcome)
}
