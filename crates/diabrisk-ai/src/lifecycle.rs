//! Model lifecycle: load-or-train at startup, predict, record-and-retrain.
//!
//! A [`ModelManager`] only exists in the ready state; [`ModelManager::initialize`]
//! is its sole constructor. Retraining appends the user's label first, then
//! fits over the combined dataset, persists the new artifact, and only then
//! swaps the in-memory model. A failure at any step leaves the previous model
//! active in memory and on disk, while an appended label always stays stored.
//!
//! Several processes sharing one increment file and artifact path are not
//! coordinated: their appends interleave and the last artifact written wins.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use diabrisk_core::{ForestParams, Observation, Outcome, SchemaError, Settings};
use diabrisk_store::{DatasetStore, StoreError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactIssue, ArtifactLoad, ModelArtifact};
use crate::training::{TrainingError, TrainingSet};

/// Coarse error category for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DataUnavailable,
    Persistence,
    SchemaMismatch,
    Training,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DataUnavailable => "data unavailable",
            Self::Persistence => "persistence error",
            Self::SchemaMismatch => "schema mismatch",
            Self::Training => "training error",
        })
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("schema mismatch: {0}")]
    Schema(#[from] SchemaError),

    #[error("training failed: {0}")]
    Training(#[from] TrainingError),

    #[error("cannot read model artifact {path}: {source}")]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write model artifact {path}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(StoreError::DataUnavailable { .. }) => ErrorKind::DataUnavailable,
            Self::Store(StoreError::Schema(_)) | Self::Schema(_) => ErrorKind::SchemaMismatch,
            Self::Store(_) | Self::ArtifactRead { .. } | Self::ArtifactWrite { .. } => {
                ErrorKind::Persistence
            }
            Self::Training(_) => ErrorKind::Training,
        }
    }
}

/// How the manager obtained its first model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Startup {
    /// A valid artifact was read from disk.
    Loaded,
    /// The artifact was unusable; a new one was trained and persisted.
    Trained(ArtifactIssue),
}

/// Summary of a successful retrain.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrainReport {
    pub training_rows: usize,
    pub increment_rows: usize,
    pub trained_at: DateTime<Utc>,
}

/// Sole owner of the in-memory model and writer of the artifact file.
pub struct ModelManager {
    store: DatasetStore,
    model_path: PathBuf,
    params: ForestParams,
    artifact: ModelArtifact,
    startup: Startup,
}

impl ModelManager {
    /// Load the persisted artifact, or train and persist one over the combined
    /// dataset if it is missing or corrupt.
    ///
    /// An error here is fatal: without a model there is nothing to predict with.
    pub fn initialize(
        store: DatasetStore,
        model_path: impl Into<PathBuf>,
        params: ForestParams,
    ) -> Result<Self, LifecycleError> {
        let model_path = model_path.into();
        let load = ModelArtifact::load(&model_path).map_err(|source| {
            LifecycleError::ArtifactRead {
                path: model_path.clone(),
                source,
            }
        })?;

        let (artifact, startup) = match load {
            ArtifactLoad::Ready(artifact) => {
                info!(
                    path = %model_path.display(),
                    rows = artifact.training_rows,
                    trained_at = %artifact.trained_at,
                    "loaded model artifact"
                );
                if artifact.forest.params() != &params {
                    debug!(
                        "persisted forest params differ from configuration; \
                         next retrain applies the configured ones"
                    );
                }
                (artifact, Startup::Loaded)
            }
            ArtifactLoad::NeedsTraining(issue) => {
                warn!(reason = %issue, "no usable model artifact; training from scratch");
                let artifact = fit_combined(&store, &params)?;
                persist(&artifact, &model_path)?;
                (artifact, Startup::Trained(issue))
            }
        };

        Ok(Self {
            store,
            model_path,
            params,
            artifact,
            startup,
        })
    }

    /// Open the dataset store and initialize from one settings snapshot.
    pub fn from_settings(settings: &Settings) -> Result<Self, LifecycleError> {
        let store = DatasetStore::from_settings(settings)?;
        Self::initialize(store, &settings.model_path, settings.forest.clone())
    }

    pub fn predict(&self, observation: &Observation) -> Outcome {
        self.artifact.predict(observation)
    }

    /// Ensemble probability that the observation is diabetic.
    pub fn risk(&self, observation: &Observation) -> f64 {
        self.artifact.risk(observation)
    }

    /// Predict from named feature values, rejecting anything off-schema.
    pub fn predict_fields<'a, I>(&self, fields: I) -> Result<Outcome, LifecycleError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let observation = Observation::from_fields(fields)?;
        Ok(self.predict(&observation))
    }

    /// Store a ground-truth label durably, then retrain over everything stored.
    ///
    /// If the append fails nothing changes. If the fit or the artifact write
    /// fails the label stays in the increment store and the previous model
    /// stays active; a later [`retrain`](Self::retrain) picks the label up.
    pub fn record_and_retrain(
        &mut self,
        observation: &Observation,
        outcome: Outcome,
    ) -> Result<RetrainReport, LifecycleError> {
        self.store.append(&observation.with_outcome(outcome))?;
        self.retrain()
    }

    /// [`record_and_retrain`](Self::record_and_retrain) for named feature values.
    /// Off-schema input is rejected before the store is touched.
    pub fn record_fields_and_retrain<'a, I>(
        &mut self,
        fields: I,
        outcome: Outcome,
    ) -> Result<RetrainReport, LifecycleError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let observation = Observation::from_fields(fields)?;
        self.record_and_retrain(&observation, outcome)
    }

    /// Refit from scratch over the combined dataset and replace the model.
    pub fn retrain(&mut self) -> Result<RetrainReport, LifecycleError> {
        let artifact = fit_combined(&self.store, &self.params)?;
        persist(&artifact, &self.model_path)?;

        let report = RetrainReport {
            training_rows: artifact.training_rows,
            increment_rows: artifact.training_rows - self.store.base_len(),
            trained_at: artifact.trained_at,
        };
        self.artifact = artifact;

        info!(
            rows = report.training_rows,
            increment = report.increment_rows,
            "model retrained"
        );
        Ok(report)
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn startup(&self) -> &Startup {
        &self.startup
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

fn fit_combined(
    store: &DatasetStore,
    params: &ForestParams,
) -> Result<ModelArtifact, LifecycleError> {
    let combined = store.combined()?;
    let set = TrainingSet::from_batch(&combined)?;
    Ok(ModelArtifact::train(&set, params)?)
}

fn persist(artifact: &ModelArtifact, path: &Path) -> Result<(), LifecycleError> {
    artifact
        .save(path)
        .map_err(|source| LifecycleError::ArtifactWrite {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata::{synthetic_rows, write_csv};
    use diabrisk_core::{pima, table};
    use tempfile::TempDir;

    const BASE_ROWS: usize = 768;

    fn params() -> ForestParams {
        ForestParams {
            n_trees: 15,
            ..ForestParams::default()
        }
    }

    fn settings(dir: &Path) -> Settings {
        Settings {
            forest: params(),
            ..Settings::default()
        }
        .rooted_at(dir)
    }

    fn setup() -> (TempDir, Settings) {
        let tmp = TempDir::new().unwrap();
        let settings = settings(tmp.path());
        write_csv(&settings.base_dataset, &synthetic_rows(BASE_ROWS));
        (tmp, settings)
    }

    fn reference_observation() -> Observation {
        Observation {
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

    fn probes() -> Vec<Observation> {
        synthetic_rows(40)
            .into_iter()
            .map(|r| r.observation)
            .chain([reference_observation()])
            .collect()
    }

    fn predictions(manager: &ModelManager) -> Vec<Outcome> {
        probes().iter().map(|o| manager.predict(o)).collect()
    }

    #[test]
    fn first_start_trains_and_persists() {
        let (_tmp, settings) = setup();
        assert!(!settings.model_path.exists());

        let manager = ModelManager::from_settings(&settings).unwrap();
        assert_eq!(manager.startup(), &Startup::Trained(ArtifactIssue::Missing));
        assert_eq!(manager.artifact().training_rows, BASE_ROWS);
        assert!(settings.model_path.exists());
    }

    #[test]
    fn second_start_loads_persisted_artifact() {
        let (_tmp, settings) = setup();
        let first = ModelManager::from_settings(&settings).unwrap();
        let second = ModelManager::from_settings(&settings).unwrap();

        assert_eq!(second.startup(), &Startup::Loaded);
        assert_eq!(second.artifact(), first.artifact());
    }

    #[test]
    fn fallback_is_reproducible_across_fresh_starts() {
        let (_a, settings_a) = setup();
        let (_b, settings_b) = setup();

        let a = ModelManager::from_settings(&settings_a).unwrap();
        let b = ModelManager::from_settings(&settings_b).unwrap();

        assert_eq!(predictions(&a), predictions(&b));
        assert_eq!(a.artifact().forest, b.artifact().forest);
    }

    #[test]
    fn corrupt_artifact_is_replaced() {
        let (_tmp, settings) = setup();
        std::fs::write(&settings.model_path, "not a model").unwrap();

        let manager = ModelManager::from_settings(&settings).unwrap();
        assert!(matches!(
            manager.startup(),
            Startup::Trained(ArtifactIssue::Corrupt(_))
        ));
        assert!(matches!(
            ModelArtifact::load(&settings.model_path).unwrap(),
            ArtifactLoad::Ready(_)
        ));
    }

    #[test]
    fn missing_base_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = ModelManager::from_settings(&settings(tmp.path()))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
    }

    #[test]
    fn single_class_base_without_artifact_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let settings = settings(tmp.path());
        let rows: Vec<_> = synthetic_rows(50)
            .into_iter()
            .map(|r| r.observation.with_outcome(Outcome::NonDiabetic))
            .collect();
        write_csv(&settings.base_dataset, &rows);

        let err = ModelManager::from_settings(&settings).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Training);
        assert!(!settings.model_path.exists());
    }

    #[test]
    fn predict_is_deterministic() {
        let (_tmp, settings) = setup();
        let manager = ModelManager::from_settings(&settings).unwrap();

        let obs = reference_observation();
        let first = manager.predict(&obs);
        let second = manager.predict(&obs);
        assert_eq!(first, second);
        assert_eq!(manager.risk(&obs), manager.risk(&obs));
    }

    #[test]
    fn predict_fields_rejects_off_schema_input() {
        let (_tmp, settings) = setup();
        let manager = ModelManager::from_settings(&settings).unwrap();

        let names = pima::feature_names();
        let values = reference_observation().features();
        let mut fields: Vec<(&str, f64)> = names.into_iter().zip(values).collect();

        assert_eq!(
            manager.predict_fields(fields.clone()).unwrap(),
            manager.predict(&reference_observation())
        );

        fields.pop();
        let err = manager.predict_fields(fields).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn record_rejects_extra_field_before_touching_store() {
        let (_tmp, settings) = setup();
        let mut manager = ModelManager::from_settings(&settings).unwrap();
        let before = std::fs::read(&settings.model_path).unwrap();

        let mut fields: Vec<(&str, f64)> = pima::feature_names()
            .into_iter()
            .zip(reference_observation().features())
            .collect();
        fields.push(("Outcome", 1.0));

        let err = manager
            .record_fields_and_retrain(fields, Outcome::Diabetic)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert!(!settings.increment_path.exists());
        assert_eq!(std::fs::read(&settings.model_path).unwrap(), before);
    }

    #[test]
    fn record_appends_and_retrains_over_combined() {
        let (_tmp, settings) = setup();
        let mut manager = ModelManager::from_settings(&settings).unwrap();
        let obs = reference_observation();

        // Two predictions with no retrain in between agree.
        assert_eq!(manager.predict(&obs), manager.predict(&obs));

        let report = manager.record_and_retrain(&obs, Outcome::Diabetic).unwrap();
        assert_eq!(report.training_rows, BASE_ROWS + 1);
        assert_eq!(report.increment_rows, 1);

        let stored = table::from_batch(&manager.store().load_increment().unwrap()).unwrap();
        assert_eq!(stored, vec![obs.with_outcome(Outcome::Diabetic)]);
        assert_eq!(manager.store().combined().unwrap().num_rows(), BASE_ROWS + 1);

        // The persisted artifact is the one now in memory.
        match ModelArtifact::load(&settings.model_path).unwrap() {
            ArtifactLoad::Ready(on_disk) => assert_eq!(&on_disk, manager.artifact()),
            other => panic!("expected ready artifact, got {other:?}"),
        }
    }

    #[test]
    fn increment_holds_exactly_the_recorded_rows_in_order() {
        let (_tmp, settings) = setup();
        let mut manager = ModelManager::from_settings(&settings).unwrap();

        let inputs: Vec<_> = synthetic_rows(3)
            .into_iter()
            .zip([Outcome::Diabetic, Outcome::NonDiabetic, Outcome::Diabetic])
            .map(|(r, outcome)| r.observation.with_outcome(outcome))
            .collect();
        for row in &inputs {
            manager
                .record_and_retrain(&row.observation, row.outcome)
                .unwrap();
        }

        let stored = table::from_batch(&manager.store().load_increment().unwrap()).unwrap();
        assert_eq!(stored, inputs);
        assert_eq!(manager.artifact().training_rows, BASE_ROWS + 3);
    }

    #[test]
    fn failed_append_leaves_model_untouched() {
        let (tmp, settings) = setup();
        ModelManager::from_settings(&settings).unwrap();
        let before = std::fs::read(&settings.model_path).unwrap();

        // The increment path is a directory, so appending must fail.
        let broken = Settings {
            increment_path: tmp.path().to_path_buf(),
            ..settings.clone()
        };
        let mut manager = ModelManager::from_settings(&broken).unwrap();
        let predicted = predictions(&manager);
        let artifact = manager.artifact().clone();

        let err = manager
            .record_and_retrain(&reference_observation(), Outcome::Diabetic)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);

        assert_eq!(std::fs::read(&settings.model_path).unwrap(), before);
        assert_eq!(manager.artifact(), &artifact);
        assert_eq!(predictions(&manager), predicted);
    }

    #[test]
    fn failed_artifact_write_keeps_model_and_label() {
        let (_tmp, settings) = setup();
        let mut manager = ModelManager::from_settings(&settings).unwrap();
        let artifact = manager.artifact().clone();
        let predicted = predictions(&manager);

        // A directory where the artifact file should go makes the rename fail.
        std::fs::remove_file(&settings.model_path).unwrap();
        std::fs::create_dir(&settings.model_path).unwrap();

        let err = manager
            .record_and_retrain(&reference_observation(), Outcome::Diabetic)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(matches!(err, LifecycleError::ArtifactWrite { .. }));

        assert_eq!(manager.artifact(), &artifact);
        assert_eq!(predictions(&manager), predicted);
        assert_eq!(manager.store().increment_len().unwrap(), 1);

        // With the path clear again, a plain retrain persists the stored label.
        std::fs::remove_dir(&settings.model_path).unwrap();
        let report = manager.retrain().unwrap();
        assert_eq!(report.increment_rows, 1);
        assert!(settings.model_path.is_file());
    }

    #[test]
    fn failed_fit_keeps_model_and_label() {
        // A model trained elsewhere on two-class data.
        let (_good, good_settings) = setup();
        ModelManager::from_settings(&good_settings).unwrap();

        // A base with only non-diabetic rows makes every fit fail.
        let tmp = TempDir::new().unwrap();
        let settings = settings(tmp.path());
        let rows: Vec<_> = synthetic_rows(60)
            .into_iter()
            .map(|r| r.observation.with_outcome(Outcome::NonDiabetic))
            .collect();
        write_csv(&settings.base_dataset, &rows);
        std::fs::copy(&good_settings.model_path, &settings.model_path).unwrap();
        let before = std::fs::read(&settings.model_path).unwrap();

        let mut manager = ModelManager::from_settings(&settings).unwrap();
        assert_eq!(manager.startup(), &Startup::Loaded);
        let artifact = manager.artifact().clone();

        let err = manager
            .record_and_retrain(&reference_observation(), Outcome::NonDiabetic)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Training);
        assert_eq!(manager.artifact(), &artifact);
        assert_eq!(std::fs::read(&settings.model_path).unwrap(), before);
        assert_eq!(manager.store().increment_len().unwrap(), 1);

        // Once a positive example arrives, retraining succeeds and still
        // includes the label stored by the failed attempt.
        let positive = Observation {
            glucose: 190,
            ..reference_observation()
        };
        manager
            .store()
            .append(&positive.with_outcome(Outcome::Diabetic))
            .unwrap();
        let report = manager.retrain().unwrap();
        assert_eq!(report.training_rows, 62);
        assert_eq!(report.increment_rows, 2);
        assert_ne!(std::fs::read(&settings.model_path).unwrap(), before);
    }
}
