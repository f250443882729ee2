//! Clinical observations and their binary diabetes label.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SchemaError;
use crate::schema::pima::{self, FEATURE_COUNT, FEATURES, FeatureKind};

/// Ground-truth or predicted diabetes status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Stored as `0`.
    NonDiabetic,
    /// Stored as `1`.
    Diabetic,
}

impl Outcome {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::NonDiabetic => 0,
            Self::Diabetic => 1,
        }
    }

    pub fn from_i64(value: i64) -> Result<Self, SchemaError> {
        match value {
            0 => Ok(Self::NonDiabetic),
            1 => Ok(Self::Diabetic),
            other => Err(SchemaError::InvalidLabel(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonDiabetic => "Non-Diabetic",
            Self::Diabetic => "Diabetic",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the user knows about the true outcome of an observation.
///
/// Only a `Known` choice may be recorded into the increment store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutcomeChoice {
    #[default]
    Unknown,
    Known(Outcome),
}

impl OutcomeChoice {
    pub fn known(self) -> Option<Outcome> {
        match self {
            Self::Unknown => None,
            Self::Known(outcome) => Some(outcome),
        }
    }
}

impl From<Outcome> for OutcomeChoice {
    fn from(outcome: Outcome) -> Self {
        Self::Known(outcome)
    }
}

/// The eight clinical features of one patient, in storage order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub pregnancies: i64,
    pub glucose: i64,
    pub blood_pressure: i64,
    pub skin_thickness: i64,
    pub insulin: i64,
    pub bmi: f64,
    pub diabetes_pedigree_function: f64,
    pub age: i64,
}

impl Observation {
    /// Build an observation from named values.
    ///
    /// Names, count and order must match [`pima::FEATURES`] exactly; a missing,
    /// extra or misplaced field is a [`SchemaError`].
    pub fn from_fields<'a, I>(fields: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let (names, values): (Vec<&str>, Vec<f64>) = fields.into_iter().unzip();
        pima::validate_feature_names(&names)?;

        let mut row = [0.0; FEATURE_COUNT];
        row.copy_from_slice(&values);
        Self::from_values(row)
    }

    /// Build an observation from values in storage order.
    ///
    /// Integer columns must hold whole numbers and every value must be finite.
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Result<Self, SchemaError> {
        for (spec, &value) in FEATURES.iter().zip(&values) {
            if !value.is_finite() {
                return Err(SchemaError::NonFinite {
                    field: spec.name,
                    value,
                });
            }
            if spec.kind == FeatureKind::Integer && value.fract() != 0.0 {
                return Err(SchemaError::NotIntegral {
                    field: spec.name,
                    value,
                });
            }
        }

        Ok(Self {
            pregnancies: values[0] as i64,
            glucose: values[1] as i64,
            blood_pressure: values[2] as i64,
            skin_thickness: values[3] as i64,
            insulin: values[4] as i64,
            bmi: values[5],
            diabetes_pedigree_function: values[6],
            age: values[7] as i64,
        })
    }

    /// Feature values in storage order, as fed to the classifier.
    pub fn features(&self) -> [f64; FEATURE_COUNT] {
        [
            self.pregnancies as f64,
            self.glucose as f64,
            self.blood_pressure as f64,
            self.skin_thickness as f64,
            self.insulin as f64,
            self.bmi,
            self.diabetes_pedigree_function,
            self.age as f64,
        ]
    }

    pub fn with_outcome(self, outcome: Outcome) -> LabelledObservation {
        LabelledObservation {
            observation: self,
            outcome,
        }
    }
}

impl Default for Observation {
    /// The input form's initial values.
    fn default() -> Self {
        Self {
            pregnancies: 1,
            glucose: 120,
            blood_pressure: 70,
            skin_thickness: 20,
            insulin: 80,
            bmi: 25.0,
            diabetes_pedigree_function: 0.5,
            age: 30,
        }
    }
}

/// An observation with its ground-truth label: one row of a training table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelledObservation {
    pub observation: Observation,
    pub outcome: Outcome,
}
