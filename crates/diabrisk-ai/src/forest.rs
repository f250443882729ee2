//! Bagged ensemble of CART trees.
//!
//! Mirrors the usual random forest classifier defaults: bootstrap samples,
//! `sqrt(n_features)` split candidates, fully grown trees, and the mean leaf
//! probability as the ensemble score. All randomness flows from one seeded
//! generator, so the same rows and params always grow the same forest.

use diabrisk_core::pima::FEATURE_COUNT;
use diabrisk_core::{ForestParams, Outcome};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::training::{TrainingError, TrainingSet};
use crate::tree::{DecisionTree, TreeParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit a new forest from scratch.
    pub fn fit(set: &TrainingSet, params: &ForestParams) -> Result<Self, TrainingError> {
        if params.n_trees == 0 {
            return Err(TrainingError::InvalidParams("n_trees must be at least 1".into()));
        }
        if params.min_samples_split < 2 {
            return Err(TrainingError::InvalidParams(
                "min_samples_split must be at least 2".into(),
            ));
        }
        set.check_fittable()?;

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            max_features: max_features(),
        };

        let n = set.len();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees: Vec<DecisionTree> = (0..params.n_trees)
            .map(|_| {
                let mut tree_rng = StdRng::seed_from_u64(rng.random());
                let bootstrap = (0..n).map(|_| tree_rng.random_range(0..n)).collect();
                DecisionTree::fit(set, bootstrap, &tree_params, &mut tree_rng)
            })
            .collect();

        let nodes: usize = trees.iter().map(DecisionTree::node_count).sum();
        info!(
            trees = trees.len(),
            rows = n,
            nodes,
            seed = params.seed,
            "fitted random forest"
        );

        Ok(Self {
            params: params.clone(),
            trees,
        })
    }

    /// Mean positive-class probability across trees, in `[0, 1]`.
    pub fn risk(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.positive_probability(x)).sum();
        total / self.trees.len() as f64
    }

    /// Majority label; an exact tie goes to non-diabetic.
    pub fn predict(&self, x: &[f64; FEATURE_COUNT]) -> Outcome {
        if self.risk(x) > 0.5 {
            Outcome::Diabetic
        } else {
            Outcome::NonDiabetic
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Structural check for forests read from disk.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".into());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(())
    }
}

/// Split candidates per node: `floor(sqrt(n_features))`, at least one.
fn max_features() -> usize {
    ((FEATURE_COUNT as f64).sqrt() as usize).max(1)
}
