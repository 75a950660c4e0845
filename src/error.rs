use thiserror::Error;

/// Errors raised while moving an index from Elasticsearch into JSON and MySQL.
///
/// Only [`EtlError::Authentication`], [`EtlError::Connection`] and
/// [`EtlError::Catalog`] stop a run; every other variant is scoped to the index
/// being processed and ends up in the run report.
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("invalid Elasticsearch credentials: {0}")]
    Authentication(String),

    #[error("cannot reach Elasticsearch: {0}")]
    Connection(String),

    #[error("could not list indices: {0}")]
    Catalog(String),

    #[error("failed to fetch documents from '{index}': {reason}")]
    Fetch { index: String, reason: String },

    #[error("cannot build a table for '{index}': {reason}")]
    Schema { index: String, reason: String },

    #[error("storage error on '{table}': {source}")]
    Storage {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error(
        "batch {batch} of '{table}' failed after {committed} rows were committed: {source}"
    )]
    Persistence {
        table: String,
        batch: usize,
        committed: u64,
        #[source]
        source: sqlx::Error,
    },

    #[error("row '{id}' has columns not present in table '{table}': {}", columns.join(", "))]
    ExtraColumns {
        table: String,
        id: String,
        columns: Vec<String>,
    },

    #[error(
        "row '{id}' has a {found} value in {expected} column '{column}' of table '{table}'"
    )]
    TypeConflict {
        table: String,
        id: String,
        column: String,
        expected: String,
        found: &'static str,
    },

    #[error("failed to write JSON file {path}: {reason}")]
    Artifact { path: String, reason: String },
}

impl EtlError {
    /// Whether the error aborts the whole run instead of a single index.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EtlError::Authentication(_) | EtlError::Connection(_) | EtlError::Catalog(_)
        )
    }

    pub(crate) fn fetch(index: &str, reason: impl ToString) -> Self {
        EtlError::Fetch {
            index: index.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn schema(index: &str, reason: impl ToString) -> Self {
        EtlError::Schema {
            index: index.to_string(),
            reason: reason.to_string(),
        }
    }
}
