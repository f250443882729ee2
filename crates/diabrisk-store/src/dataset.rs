//! Dataset store: immutable base table plus an append-only increment file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use diabrisk_core::{LabelledObservation, Settings, pima, table};
use tracing::{debug, info};

use crate::StoreError;
use crate::csv::{self, CsvError};

/// Durable custody of labelled training data.
///
/// The base dataset is read once in [`open`](Self::open) and never touched
/// again. The increment file is created on first [`append`](Self::append)
/// and only ever grows; [`combined`](Self::combined) re-reads it on every call
/// so a retrain always sees exactly what is on disk.
///
/// The store assumes a single writer. Two processes appending to the same
/// increment file are not coordinated.
pub struct DatasetStore {
    base_path: PathBuf,
    increment_path: PathBuf,
    base: RecordBatch,
}

impl DatasetStore {
    /// Open the store, loading and validating the base dataset.
    ///
    /// Fails with [`StoreError::DataUnavailable`] if the base file is missing
    /// or does not parse against the schema.
    pub fn open(
        base_path: impl Into<PathBuf>,
        increment_path: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        let base_path = base_path.into();
        let increment_path = increment_path.into();

        let base = load_base(&base_path)?;
        info!(rows = base.num_rows(), path = %base_path.display(), "loaded base dataset");

        Ok(Self {
            base_path,
            increment_path,
            base,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, StoreError> {
        Self::open(&settings.base_dataset, &settings.increment_path)
    }

    /// The base dataset, exactly as loaded at open.
    pub fn load_base(&self) -> RecordBatch {
        self.base.clone()
    }

    /// Read the increment file. A file that does not exist yet is an empty
    /// table; any other failure to open it is an error.
    pub fn load_increment(&self) -> Result<RecordBatch, StoreError> {
        match csv::read_labelled(&self.increment_path) {
            Ok(batch) => Ok(batch),
            Err(CsvError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.increment_path.display(), "no increment file yet");
                Ok(table::empty())
            }
            Err(e) => Err(self.increment_error(e)),
        }
    }

    /// Append one labelled row to the increment file.
    ///
    /// The header is written only when the file is created (or found empty).
    pub fn append(&self, row: &LabelledObservation) -> Result<(), StoreError> {
        csv::append_labelled(&self.increment_path, std::slice::from_ref(row))
            .map_err(|e| self.increment_error(e))?;
        info!(
            path = %self.increment_path.display(),
            outcome = %row.outcome,
            "appended labelled observation"
        );
        Ok(())
    }

    /// Base rows in stored order, then increment rows in append order.
    pub fn combined(&self) -> Result<RecordBatch, StoreError> {
        let increment = self.load_increment()?;
        let combined = concat_batches(&pima::labelled_schema_ref(), [&self.base, &increment])?;
        debug!(
            base = self.base.num_rows(),
            increment = increment.num_rows(),
            "built combined dataset"
        );
        Ok(combined)
    }

    pub fn base_len(&self) -> usize {
        self.base.num_rows()
    }

    pub fn increment_len(&self) -> Result<usize, StoreError> {
        Ok(self.load_increment()?.num_rows())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn increment_path(&self) -> &Path {
        &self.increment_path
    }

    fn increment_error(&self, err: CsvError) -> StoreError {
        let path = self.increment_path.clone();
        match err {
            CsvError::Io(source) => StoreError::Persistence { path, source },
            CsvError::Schema(e) => StoreError::IncrementCorrupt {
                path,
                reason: e.to_string(),
            },
            CsvError::Arrow(e) => StoreError::IncrementCorrupt {
                path,
                reason: e.to_string(),
            },
        }
    }
}

fn load_base(path: &Path) -> Result<RecordBatch, StoreError> {
    if !path.exists() {
        return Err(StoreError::DataUnavailable {
            path: path.to_path_buf(),
            reason: "file not found".into(),
        });
    }
    csv::read_labelled(path).map_err(|e| StoreError::DataUnavailable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
