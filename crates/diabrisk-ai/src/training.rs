//! Feature matrix and labels fed to the forest.

use arrow::record_batch::RecordBatch;
use diabrisk_core::pima::{FEATURE_COUNT, FEATURES};
use diabrisk_core::{LabelledObservation, Outcome, SchemaError, table};
use thiserror::Error;

/// Why a fit was refused. The caller's previous model is unaffected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainingError {
    #[error("cannot train on an empty dataset")]
    EmptyDataset,

    #[error("all {rows} training rows are labelled {class}; both outcomes are required")]
    SingleClass { class: Outcome, rows: usize },

    #[error("row {row}: {column} is not a finite number")]
    NonFiniteFeature { row: usize, column: &'static str },

    #[error("invalid forest parameters: {0}")]
    InvalidParams(String),
}

/// Dense feature rows with their labels, in table order.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    features: Vec<[f64; FEATURE_COUNT]>,
    labels: Vec<Outcome>,
}

impl TrainingSet {
    pub fn from_rows(rows: &[LabelledObservation]) -> Self {
        Self {
            features: rows.iter().map(|r| r.observation.features()).collect(),
            labels: rows.iter().map(|r| r.outcome).collect(),
        }
    }

    /// Build from a labelled Arrow table such as `DatasetStore::combined()`.
    pub fn from_batch(batch: &RecordBatch) -> Result<Self, SchemaError> {
        Ok(Self::from_rows(&table::from_batch(batch)?))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn features(&self, row: usize) -> &[f64; FEATURE_COUNT] {
        &self.features[row]
    }

    pub fn is_positive(&self, row: usize) -> bool {
        self.labels[row] == Outcome::Diabetic
    }

    /// `(non_diabetic, diabetic)` row counts.
    pub fn class_counts(&self) -> (usize, usize) {
        let positives = self
            .labels
            .iter()
            .filter(|&&l| l == Outcome::Diabetic)
            .count();
        (self.len() - positives, positives)
    }

    /// Refuse inputs a classifier cannot be fitted on.
    pub(crate) fn check_fittable(&self) -> Result<(), TrainingError> {
        for (row, x) in self.features.iter().enumerate() {
            if let Some(col) = x.iter().position(|v| !v.is_finite()) {
                return Err(TrainingError::NonFiniteFeature {
                    row,
                    column: FEATURES[col].name,
                });
            }
        }
        match self.class_counts() {
            (0, 0) => Err(TrainingError::EmptyDataset),
            (0, rows) => Err(TrainingError::SingleClass {
                class: Outcome::Diabetic,
                rows,
            }),
            (rows, 0) => Err(TrainingError::SingleClass {
                class: Outcome::NonDiabetic,
                rows,
            }),
            _ => Ok(()),
        }
    }
}
