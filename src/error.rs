use thiserror::Error;

use crate::registry::EntityKind;

/// Why a single source record (or one of its nested entries) was not loaded.
/// Never aborts a stage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("record is not an object")]
    NotAnObject,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unresolved {kind} reference `{key}`")]
    UnresolvedReference { kind: EntityKind, key: String },

    #[error("malformed field `{field}`: {detail}")]
    Malformed { field: &'static str, detail: String },

    #[error("excluded by source flag `{0}`")]
    Filtered(&'static str),
}

impl RecordError {
    pub fn unresolved(kind: EntityKind, key: impl Into<String>) -> Self {
        RecordError::UnresolvedReference {
            kind,
            key: key.into(),
        }
    }

    /// Stable category used to aggregate skips in the run summary
    pub fn category(&self) -> &'static str {
        match self {
            RecordError::NotAnObject => "not_an_object",
            RecordError::MissingField(_) => "missing_field",
            RecordError::UnresolvedReference { .. } => "unresolved_reference",
            RecordError::Malformed { .. } => "malformed",
            RecordError::Filtered(_) => "filtered",
        }
    }
}

/// A store failure. Fails the whole stage and aborts the run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("batch of {rows} rows rejected by `{table}` (sample: {sample:?})")]
    BatchRejected {
        table: &'static str,
        rows: usize,
        sample: Vec<String>,
        #[source]
        source: rusqlite::Error,
    },

    #[error("schema error: {0}")]
    Schema(String),
}
