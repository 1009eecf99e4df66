use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlignError {
    /// Drivers take exactly two tables.
    #[error("expected exactly 2 input tables, got {0}")]
    TableCount(usize),
    /// Header missing, duplicated columns, or ragged rows.
    #[error("table '{table}' is not a proper table: {reason}")]
    MalformedTable { table: String, reason: String },
    /// Column set differs from the configured key + item columns.
    #[error("table '{table}': expected columns {expected:?}, found {found:?}")]
    ColumnMismatch {
        table: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
    /// A group-key field has different value sets in the two tables.
    #[error(
        "group key field '{field}' differs: only in left {only_left:?}, only in right {only_right:?}"
    )]
    KeyMismatch {
        field: String,
        only_left: Vec<String>,
        only_right: Vec<String>,
    },
    /// A full group key exists in one table only.
    #[error("group {key} is only present in table '{present_in}'")]
    GroupMismatch { key: String, present_in: String },
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty column name, bad threshold, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// Word-vector file could not be read.
    #[error("embedding model error: {0}")]
    Embedding(String),
    #[error("CSV error: {0}")]
    Csv(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl AlignError {
    /// Wrong table count or a table that is not a proper table.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::TableCount(_) | Self::MalformedTable { .. })
    }

    /// Column or group-key universes differ between the inputs.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(
            self,
            Self::ColumnMismatch { .. } | Self::KeyMismatch { .. } | Self::GroupMismatch { .. }
        )
    }
}

impl From<csv::Error> for AlignError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}
