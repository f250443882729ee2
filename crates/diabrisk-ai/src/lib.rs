//! Classification layer: CART trees bagged into a random forest, the persisted
//! model artifact, and the lifecycle that retrains it from the dataset store.

mod artifact;
mod forest;
mod lifecycle;
mod training;
mod tree;

#[cfg(test)]
mod testdata;

pub use artifact::{ARTIFACT_FORMAT, ArtifactIssue, ArtifactLoad, ModelArtifact};
pub use forest::RandomForest;
pub use lifecycle::{ErrorKind, LifecycleError, ModelManager, RetrainReport, Startup};
pub use training::{TrainingError, TrainingSet};
pub use tree::{DecisionTree, Node};
