use thiserror::Error;

/// A record or table that does not match the Pima column contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("expected {expected} feature fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("field {position} should be `{expected}`, found `{found}`")]
    FieldName {
        position: usize,
        expected: &'static str,
        found: String,
    },

    #[error("header mismatch: expected [{expected}], found [{found}]")]
    Header { expected: String, found: String },

    #[error("column `{column}` is missing or not {expected}")]
    Column {
        column: &'static str,
        expected: &'static str,
    },

    #[error("null value in `{column}` at row {row}")]
    Null { column: &'static str, row: usize },

    #[error("`{field}` must be a whole number, got {value}")]
    NotIntegral { field: &'static str, value: f64 },

    #[error("`{field}` must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("`Outcome` must be 0 or 1, got {0}")]
    InvalidLabel(i64),
}
