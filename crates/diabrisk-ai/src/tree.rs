//! CART decision tree with Gini impurity and random feature subsets.
//!
//! Nodes live in a flat arena; children are always pushed after their parent,
//! so every child index is greater than its parent's. Traversal therefore
//! terminates on any tree that passes [`DecisionTree::validate`].

use diabrisk_core::pima::FEATURE_COUNT;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::training::TrainingSet;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Fraction of training rows at this leaf labelled diabetic.
    Leaf { positive: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Features drawn as split candidates at each node.
    pub max_features: usize,
}

struct Split {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl DecisionTree {
    /// Grow a tree over `samples` (row indices into `set`, repeats allowed).
    pub(crate) fn fit<R: Rng>(
        set: &TrainingSet,
        samples: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut nodes = vec![Node::Leaf { positive: 0.0 }];
        let mut pending = vec![(0usize, samples, 0usize)];

        while let Some((id, samples, depth)) = pending.pop() {
            let positives = samples.iter().filter(|&&i| set.is_positive(i)).count();
            let leaf = Node::Leaf {
                positive: if samples.is_empty() {
                    0.0
                } else {
                    positives as f64 / samples.len() as f64
                },
            };

            let pure = positives == 0 || positives == samples.len();
            let too_small = samples.len() < params.min_samples_split;
            let too_deep = params.max_depth.is_some_and(|d| depth >= d);
            if pure || too_small || too_deep {
                nodes[id] = leaf;
                continue;
            }

            let Some(split) = best_split(set, &samples, params.max_features, rng) else {
                nodes[id] = leaf;
                continue;
            };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = samples
                .into_iter()
                .partition(|&i| set.features(i)[split.feature] <= split.threshold);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf { positive: 0.0 });
            nodes.push(Node::Leaf { positive: 0.0 });
            nodes[id] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };

            pending.push((right, right_rows, depth + 1));
            pending.push((left, left_rows, depth + 1));
        }

        Self { nodes }
    }

    /// Positive-class probability of the leaf reached by `x`.
    pub fn positive_probability(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { positive } => return *positive,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if x[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut pending = vec![(0usize, 0usize)];
        while let Some((id, depth)) = pending.pop() {
            max_depth = max_depth.max(depth);
            if let Node::Split { left, right, .. } = self.nodes[id] {
                pending.push((left, depth + 1));
                pending.push((right, depth + 1));
            }
        }
        max_depth
    }

    /// Structural check for trees read from disk.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (id, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= FEATURE_COUNT {
                        return Err(format!("node {id} splits on unknown feature {feature}"));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {id} has a NaN threshold"));
                    }
                    for child in [left, right] {
                        if child <= id || child >= self.nodes.len() {
                            return Err(format!("node {id} has invalid child {child}"));
                        }
                    }
                }
                Node::Leaf { positive } => {
                    if !(0.0..=1.0).contains(&positive) {
                        return Err(format!("leaf {id} has probability {positive}"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Pick the lowest-impurity split among a random subset of features.
///
/// If none of the first `max_features` candidates can separate the rows
/// (all constant), further features are tried until one can.
fn best_split<R: Rng>(
    set: &TrainingSet,
    samples: &[usize],
    max_features: usize,
    rng: &mut R,
) -> Option<Split> {
    let mut features: Vec<usize> = (0..FEATURE_COUNT).collect();
    features.shuffle(rng);

    let mut best: Option<Split> = None;
    for (visited, &feature) in features.iter().enumerate() {
        if visited >= max_features && best.is_some() {
            break;
        }
        if let Some(candidate) = best_threshold(set, samples, feature)
            && best.as_ref().is_none_or(|b| candidate.impurity < b.impurity)
        {
            best = Some(candidate);
        }
    }
    best
}

/// Sweep the sorted values of one feature for the split with least weighted Gini.
fn best_threshold(set: &TrainingSet, samples: &[usize], feature: usize) -> Option<Split> {
    let mut column: Vec<(f64, bool)> = samples
        .iter()
        .map(|&i| (set.features(i)[feature], set.is_positive(i)))
        .collect();
    column.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n = column.len();
    let total_pos = column.iter().filter(|(_, p)| *p).count();
    let mut left_pos = 0;
    let mut best: Option<Split> = None;

    for k in 1..n {
        if column[k - 1].1 {
            left_pos += 1;
        }
        let (lo, hi) = (column[k - 1].0, column[k].0);
        if lo == hi {
            continue;
        }

        let right_n = n - k;
        let impurity = (k as f64 * gini(left_pos, k)
            + right_n as f64 * gini(total_pos - left_pos, right_n))
            / n as f64;

        if best.as_ref().is_none_or(|b| impurity < b.impurity) {
            best = Some(Split {
                feature,
                threshold: midpoint(lo, hi),
                impurity,
            });
        }
    }
    best
}

fn gini(positives: usize, n: usize) -> f64 {
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

/// Halfway between two adjacent distinct values, falling back to `lo` when
/// rounding would land on `hi`.
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo / 2.0 + hi / 2.0;
    if mid == hi || !mid.is_finite() { lo } else { mid }
}
