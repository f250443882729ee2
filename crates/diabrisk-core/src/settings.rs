//! File locations and training parameters shared by the store, the model
//! lifecycle and the CLI.
//!
//! Layering is defaults < JSON config file < caller overrides (the CLI applies
//! environment variables and flags on top of what [`Settings::from_json_file`]
//! returns).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Random forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees in the ensemble.
    pub n_trees: usize,
    /// Seed for bootstrap sampling and feature selection.
    pub seed: u64,
    /// Maximum tree depth; `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    /// Minimum number of samples a node needs before it may split.
    pub min_samples_split: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Read-only base dataset (CSV with the nine-column header).
    pub base_dataset: PathBuf,
    /// Append-only file of user-labelled rows, created on first append.
    pub increment_path: PathBuf,
    /// Serialized model artifact.
    pub model_path: PathBuf,
    pub forest: ForestParams,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_dataset: PathBuf::from("diabetes.csv"),
            increment_path: PathBuf::from("user_data.csv"),
            model_path: PathBuf::from("diabetes_model.json"),
            forest: ForestParams::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Resolve every relative path against `root`.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        for path in [
            &mut self.base_dataset,
            &mut self.increment_path,
            &mut self.model_path,
        ] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
        self
    }
}
