//! Plain-text rendering of predictions, retrain results and model status.
//!
//! Every renderer returns a `String` so `main` decides where it goes; logs
//! stay on stderr, rendered output goes to stdout.

use std::fmt::Write;

use diabrisk_ai::{ModelManager, RetrainReport, Startup};
use diabrisk_core::pima::{FEATURES, FeatureKind};
use diabrisk_core::{Observation, Outcome};

const LABEL_WIDTH: usize = 26;

// ── Public API ──

/// Input card followed by the predicted label and ensemble risk.
pub fn prediction(observation: &Observation, outcome: Outcome, risk: f64) -> String {
    let mut out = observation_card(observation);
    let _ = writeln!(out);
    let _ = writeln!(out, "Predicted: {outcome}");
    let _ = writeln!(out, "{:<LABEL_WIDTH$} {:.1}%", "Risk", risk * 100.0);
    out
}

/// Confirmation after a label was stored and the model refitted.
pub fn recorded(outcome: Outcome, report: &RetrainReport) -> String {
    let mut out = format!("Recorded outcome {outcome}; model updated.\n");
    out.push_str(&retrain_summary(report));
    out
}

pub fn retrained(report: &RetrainReport) -> String {
    let mut out = String::from("Model retrained.\n");
    out.push_str(&retrain_summary(report));
    out
}

/// Dataset sizes and artifact metadata.
pub fn info(manager: &ModelManager, increment_rows: usize) -> String {
    let store = manager.store();
    let artifact = manager.artifact();
    let forest = &artifact.forest;
    let params = forest.params();

    let mut out = String::new();
    section(
        &mut out,
        "Dataset",
        &[
            ("base file", store.base_path().display().to_string()),
            ("base rows", store.base_len().to_string()),
            ("increment file", store.increment_path().display().to_string()),
            ("increment rows", increment_rows.to_string()),
        ],
    );
    let startup = match manager.startup() {
        Startup::Loaded => "loaded from disk".to_string(),
        Startup::Trained(issue) => format!("trained at startup ({issue})"),
    };
    section(
        &mut out,
        "Model",
        &[
            ("artifact", manager.model_path().display().to_string()),
            ("format", artifact.format.to_string()),
            ("status", startup),
            ("trained at", timestamp(artifact.trained_at)),
            ("training rows", artifact.training_rows.to_string()),
            ("trees", forest.n_trees().to_string()),
            ("seed", params.seed.to_string()),
            (
                "max depth",
                params
                    .max_depth
                    .map_or_else(|| "unlimited".to_string(), |d| d.to_string()),
            ),
            ("min samples split", params.min_samples_split.to_string()),
        ],
    );
    out
}

// ── Section rendering ──

fn observation_card(observation: &Observation) -> String {
    let rows: Vec<(&str, String)> = FEATURES
        .iter()
        .zip(observation.features())
        .map(|(spec, value)| {
            let text = match spec.kind {
                FeatureKind::Integer => format!("{value:.0}"),
                FeatureKind::Continuous => format!("{value:.3}"),
            };
            (spec.name, text)
        })
        .collect();
    let mut out = String::new();
    section(&mut out, "Input", &rows);
    out
}

fn retrain_summary(report: &RetrainReport) -> String {
    let mut out = String::new();
    section(
        &mut out,
        "Training",
        &[
            ("training rows", report.training_rows.to_string()),
            ("increment rows", report.increment_rows.to_string()),
            ("trained at", timestamp(report.trained_at)),
        ],
    );
    out
}

fn section<K: AsRef<str>>(out: &mut String, header: &str, rows: &[(K, String)]) {
    let _ = writeln!(out, "{header}");
    for (label, value) in rows {
        let _ = writeln!(out, "  {:<LABEL_WIDTH$} {value}", label.as_ref());
    }
}

fn timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
