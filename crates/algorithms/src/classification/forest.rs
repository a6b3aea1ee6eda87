//! Random forest classifier
//!
//! Each tree is grown on a bootstrap sample and examines `sqrt(p)` random
//! features per split. Prediction is a majority vote. Trees are fitted in
//! parallel; every tree draws from its own seed, so results do not depend on
//! scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::maybe_rayon::*;
use lcfuse_core::Result;

use super::tree::{majority, validate, Criterion, DecisionTree, TreeParams};

/// Parameters for a random forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees (default: 100)
    pub n_estimators: usize,
    /// Maximum tree depth; `None` grows until leaves are pure
    pub max_depth: Option<usize>,
    pub criterion: Criterion,
    /// Minimum samples a node needs to be split (default: 2)
    pub min_samples_split: usize,
    /// Features examined per split; `None` uses `floor(sqrt(p))`
    pub max_features: Option<usize>,
    /// Draw a bootstrap sample per tree (default: true)
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            criterion: Criterion::Gini,
            min_samples_split: 2,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

/// A fitted ensemble of decision trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
    n_classes: usize,
}

impl RandomForest {
    pub fn fit(x: &[Vec<f64>], y: &[usize], n_classes: usize, params: &ForestParams) -> Result<Self> {
        let n_features = validate(x, y, n_classes)?;
        let n_trees = params.n_estimators.max(1);
        let max_features = params
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize)
            .clamp(1, n_features);

        let mut master = StdRng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..n_trees).map(|_| master.random()).collect();

        let trees = seeds
            .into_par_iter()
            .map(|seed| {
                let tree_params = TreeParams {
                    criterion: params.criterion,
                    max_depth: params.max_depth,
                    min_samples_split: params.min_samples_split,
                    max_features: Some(max_features),
                    seed,
                };
                let n = x.len();
                let indices: Vec<usize> = if params.bootstrap {
                    let mut rng = StdRng::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15);
                    (0..n).map(|_| rng.random_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                DecisionTree::fit_indices(x, y, &indices, n_classes, &tree_params)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            trees,
            n_features,
            n_classes,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Vote counts per class for one sample
    pub fn votes(&self, row: &[f64]) -> Vec<usize> {
        let mut votes = vec![0usize; self.n_classes];
        for tree in &self.trees {
            votes[tree.predict_row(row)] += 1;
        }
        votes
    }

    /// Majority vote; ties go to the lowest class code
    pub fn predict_row(&self, row: &[f64]) -> usize {
        majority(&self.votes(row))
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<usize> {
        x.par_iter().map(|row| self.predict_row(row)).collect()
    }
}
