//! Persisted model artifact.
//!
//! The artifact is a JSON document holding the fitted forest plus enough
//! metadata to reject a file written for a different schema or format.
//! Saving goes through a temporary file in the target directory followed by a
//! rename, so readers only ever see the old artifact or the new one.

use std::fmt;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use diabrisk_core::{ForestParams, Observation, Outcome, pima};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::forest::RandomForest;
use crate::training::{TrainingError, TrainingSet};

/// Bumped whenever the serialized layout changes.
pub const ARTIFACT_FORMAT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format: u32,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
    pub feature_names: Vec<String>,
    pub forest: RandomForest,
}

/// Why a persisted artifact could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactIssue {
    Missing,
    Corrupt(String),
}

impl fmt::Display for ArtifactIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("artifact missing"),
            Self::Corrupt(reason) => write!(f, "artifact corrupt: {reason}"),
        }
    }
}

/// Outcome of reading the artifact file.
#[derive(Debug)]
pub enum ArtifactLoad {
    Ready(ModelArtifact),
    NeedsTraining(ArtifactIssue),
}

impl ModelArtifact {
    /// Fit a fresh forest and wrap it with metadata.
    pub fn train(set: &TrainingSet, params: &ForestParams) -> Result<Self, TrainingError> {
        let forest = RandomForest::fit(set, params)?;
        Ok(Self {
            format: ARTIFACT_FORMAT,
            trained_at: Utc::now(),
            training_rows: set.len(),
            feature_names: pima::feature_names().map(String::from).to_vec(),
            forest,
        })
    }

    /// Read an artifact.
    ///
    /// A missing file or one that does not decode into a valid artifact is
    /// reported as [`ArtifactLoad::NeedsTraining`]. Any other I/O failure
    /// (permissions, a directory in the way) is returned as an error.
    pub fn load(path: &Path) -> std::io::Result<ArtifactLoad> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(ArtifactLoad::NeedsTraining(ArtifactIssue::Missing));
            }
            Err(e) => return Err(e),
        };

        let artifact: Self = match serde_json::from_slice(&bytes) {
            Ok(artifact) => artifact,
            Err(e) => {
                return Ok(ArtifactLoad::NeedsTraining(ArtifactIssue::Corrupt(
                    e.to_string(),
                )));
            }
        };

        Ok(match artifact.check() {
            Ok(()) => {
                debug!(
                    path = %path.display(),
                    rows = artifact.training_rows,
                    "read model artifact"
                );
                ArtifactLoad::Ready(artifact)
            }
            Err(reason) => ArtifactLoad::NeedsTraining(ArtifactIssue::Corrupt(reason)),
        })
    }

    /// Write the artifact, replacing any previous file at `path`.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        debug!(path = %path.display(), "wrote model artifact");
        Ok(())
    }

    pub fn predict(&self, observation: &Observation) -> Outcome {
        self.forest.predict(&observation.features())
    }

    pub fn risk(&self, observation: &Observation) -> f64 {
        self.forest.risk(&observation.features())
    }

    fn check(&self) -> Result<(), String> {
        if self.format != ARTIFACT_FORMAT {
            return Err(format!(
                "format {} is not supported (expected {ARTIFACT_FORMAT})",
                self.format
            ));
        }
        let names: Vec<&str> = self.feature_names.iter().map(String::as_str).collect();
        pima::validate_feature_names(&names).map_err(|e| e.to_string())?;
        self.forest.validate()
    }
}
