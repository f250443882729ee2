//! Synthetic labelled tables for tests.

use std::fmt::Write as _;
use std::path::Path;

use diabrisk_core::{LabelledObservation, Observation, Outcome, pima};

/// Deterministic rows shaped like the Pima table. Glucose above 140 or BMI
/// above 38 is labelled diabetic.
pub(crate) fn synthetic_rows(n: usize) -> Vec<LabelledObservation> {
    (0..n)
        .map(|i| {
            let obs = Observation {
                pregnancies: (i % 12) as i64,
                glucose: 70 + ((i * 37) % 130) as i64,
                blood_pressure: 50 + (i % 60) as i64,
                skin_thickness: (i % 45) as i64,
                insulin: ((i * 7) % 300) as i64,
                bmi: 18.0 + ((i * 13) % 250) as f64 / 10.0,
                diabetes_pedigree_function: 0.1 + (i % 20) as f64 / 10.0,
                age: 21 + (i % 50) as i64,
            };
            let outcome = if obs.glucose > 140 || obs.bmi > 38.0 {
                Outcome::Diabetic
            } else {
                Outcome::NonDiabetic
            };
            obs.with_outcome(outcome)
        })
        .collect()
}

/// Write rows as a CSV file with the schema header.
pub(crate) fn write_csv(path: &Path, rows: &[LabelledObservation]) {
    let mut text = pima::column_names().join(",");
    text.push('\n');
    for row in rows {
        let values = row.observation.features().map(|v| v.to_string());
        writeln!(text, "{},{}", values.join(","), row.outcome.as_i64()).unwrap();
    }
    std::fs::write(path, text).unwrap();
}
