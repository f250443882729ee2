//! Conversions between labelled observations and Arrow record batches.
//!
//! Batches always carry [`pima::labelled_schema`]: six Int64 feature columns,
//! two Float64 feature columns and the Int64 `Outcome` label.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::schema::pima::{self, FEATURE_COUNT, FEATURES, FeatureKind};
use crate::{LabelledObservation, Observation, Outcome, SchemaError};

/// A zero-row table with the labelled schema.
pub fn empty() -> RecordBatch {
    RecordBatch::new_empty(pima::labelled_schema_ref())
}

/// Build a labelled record batch from rows, preserving their order.
pub fn to_batch(rows: &[LabelledObservation]) -> Result<RecordBatch, ArrowError> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(FEATURE_COUNT + 1);

    for (idx, spec) in FEATURES.iter().enumerate() {
        let values = rows.iter().map(|r| r.observation.features()[idx]);
        let column: ArrayRef = match spec.kind {
            FeatureKind::Integer => {
                Arc::new(Int64Array::from_iter_values(values.map(|v| v as i64)))
            }
            FeatureKind::Continuous => Arc::new(Float64Array::from_iter_values(values)),
        };
        columns.push(column);
    }
    columns.push(Arc::new(Int64Array::from_iter_values(
        rows.iter().map(|r| r.outcome.as_i64()),
    )));

    RecordBatch::try_new(pima::labelled_schema_ref(), columns)
}

/// Extract labelled rows from a batch, in row order.
///
/// Columns are looked up by name, so the batch may carry them in any order,
/// but every feature and the label must be present with the schema's type.
pub fn from_batch(batch: &RecordBatch) -> Result<Vec<LabelledObservation>, SchemaError> {
    let n = batch.num_rows();
    let mut rows = vec![[0.0f64; FEATURE_COUNT]; n];

    for (idx, spec) in FEATURES.iter().enumerate() {
        let values = numeric_column(batch, spec.name, spec.kind)?;
        for (row, value) in rows.iter_mut().zip(values) {
            row[idx] = value;
        }
    }

    let labels = int_column(batch, pima::LABEL)?;

    rows.into_iter()
        .zip(labels)
        .map(|(values, label)| {
            Ok(LabelledObservation {
                observation: Observation::from_values(values)?,
                outcome: Outcome::from_i64(label)?,
            })
        })
        .collect()
}

/// Count rows per outcome: `(non_diabetic, diabetic)`.
pub fn outcome_counts(rows: &[LabelledObservation]) -> (usize, usize) {
    rows.iter().fold((0, 0), |(neg, pos), r| match r.outcome {
        Outcome::NonDiabetic => (neg + 1, pos),
        Outcome::Diabetic => (neg, pos + 1),
    })
}

// ── Arrow extraction helpers ──

fn numeric_column(
    batch: &RecordBatch,
    name: &'static str,
    kind: FeatureKind,
) -> Result<Vec<f64>, SchemaError> {
    match kind {
        FeatureKind::Integer => Ok(int_column(batch, name)?
            .into_iter()
            .map(|v| v as f64)
            .collect()),
        FeatureKind::Continuous => {
            let col = batch
                .column_by_name(name)
                .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
                .ok_or(SchemaError::Column {
                    column: name,
                    expected: "Float64",
                })?;
            non_null(col, name)?;
            Ok(col.values().to_vec())
        }
    }
}

fn int_column(batch: &RecordBatch, name: &'static str) -> Result<Vec<i64>, SchemaError> {
    let col = batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or(SchemaError::Column {
            column: name,
            expected: "Int64",
        })?;
    non_null(col, name)?;
    Ok(col.values().to_vec())
}

fn non_null(col: &dyn Array, name: &'static str) -> Result<(), SchemaError> {
    match (0..col.len()).find(|&row| col.is_null(row)) {
        Some(row) => Err(SchemaError::Null { column: name, row }),
        None => Ok(()),
    }
}
