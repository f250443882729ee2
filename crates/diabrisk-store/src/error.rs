use std::path::PathBuf;

use diabrisk_core::SchemaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The base dataset is missing or cannot be parsed. Fatal at startup.
    #[error("base dataset unavailable at {path}: {reason}")]
    DataUnavailable { path: PathBuf, reason: String },

    /// Reading or writing the increment file failed.
    #[error("increment store I/O failed at {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The increment file exists but does not parse against the schema.
    #[error("increment store at {path} is unreadable: {reason}")]
    IncrementCorrupt { path: PathBuf, reason: String },

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}
