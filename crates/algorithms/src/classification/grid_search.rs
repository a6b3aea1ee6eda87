//! Exhaustive hyperparameter search with stratified k-fold cross-validation
//!
//! Combinations are enumerated with `criterion` outermost and `n_estimators`
//! innermost. The best combination has the highest mean fold accuracy; ties
//! go to the earliest combination. The winner is refit on all training data.

use serde::{Deserialize, Serialize};

use crate::maybe_rayon::*;
use lcfuse_core::{Error, Result};

use super::forest::ForestParams;
use super::label_encoder::LabelEncoder;
use super::metrics::accuracy;
use super::pipeline::RandomForestPipeline;
use super::split::DataSplit;
use super::tree::Criterion;

/// Values to try for each hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub criterion: Vec<Criterion>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 300, 500, 700, 1000],
            max_depth: vec![6, 8, 10, 15, 20],
            criterion: vec![Criterion::Gini, Criterion::Entropy],
        }
    }
}

/// One point of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub criterion: Criterion,
}

impl HyperParams {
    pub fn forest_params(&self, seed: u64) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_depth: Some(self.max_depth),
            criterion: self.criterion,
            seed,
            ..Default::default()
        }
    }
}

impl std::fmt::Display for HyperParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "criterion={}, max_depth={}, n_estimators={}",
            self.criterion, self.max_depth, self.n_estimators
        )
    }
}

impl ParamGrid {
    /// Every combination, criterion outermost
    pub fn combinations(&self) -> Vec<HyperParams> {
        let mut out = Vec::with_capacity(self.len());
        for &criterion in &self.criterion {
            for &max_depth in &self.max_depth {
                for &n_estimators in &self.n_estimators {
                    out.push(HyperParams {
                        n_estimators,
                        max_depth,
                        criterion,
                    });
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.n_estimators.len() * self.max_depth.len() * self.criterion.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cross-validation score of one combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvScore {
    pub params: HyperParams,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

/// Outcome of a grid search: the scores, the winner, and the refit model.
///
/// This is the object persisted to disk; it carries the label classes so
/// predictions can be decoded without the training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSearchResult {
    pub classes: Vec<String>,
    pub cv_results: Vec<CvScore>,
    pub best_params: HyperParams,
    pub best_score: f64,
    pub best_model: RandomForestPipeline,
    /// Accuracy on the held-out validation partition, when evaluated
    pub validation_accuracy: Option<f64>,
}

impl GridSearchResult {
    pub fn n_features(&self) -> usize {
        self.best_model.n_features()
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<usize> {
        self.best_model.predict_row(row)
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<usize>> {
        self.best_model.predict(x)
    }

    /// Predicted class names
    pub fn predict_labels(&self, x: &[Vec<f64>]) -> Result<Vec<String>> {
        let encoder = LabelEncoder::fit(&self.classes);
        encoder.inverse_transform(&self.predict(x)?)
    }
}

/// Fold assignment for stratified k-fold.
///
/// Samples of each class are dealt round-robin over the folds in sample
/// order, each class starting where the previous one stopped.
pub fn stratified_folds(y: &[usize], k: usize) -> Result<Vec<usize>> {
    if k < 2 {
        return Err(Error::InvalidParameter {
            name: "cv_folds",
            value: k.to_string(),
            reason: "need at least 2 folds".into(),
        });
    }
    if y.len() < k {
        return Err(Error::InvalidParameter {
            name: "cv_folds",
            value: k.to_string(),
            reason: format!("only {} training samples", y.len()),
        });
    }

    let n_classes = y.iter().max().map_or(0, |&m| m + 1);
    let mut seen = vec![0usize; n_classes];
    let mut offset = 0;
    let mut class_offset = vec![0usize; n_classes];
    for class in 0..n_classes {
        class_offset[class] = offset;
        offset += y.iter().filter(|&&c| c == class).count();
    }

    let folds = y
        .iter()
        .map(|&c| {
            let fold = (class_offset[c] + seen[c]) % k;
            seen[c] += 1;
            fold
        })
        .collect::<Vec<_>>();

    let smallest = seen.iter().copied().filter(|&n| n > 0).min().unwrap_or(0);
    if smallest < k {
        tracing::warn!(
            "least populated class has {} sample(s), fewer than {} folds",
            smallest,
            k
        );
    }
    Ok(folds)
}

fn score_combination(
    x: &[Vec<f64>],
    y: &[usize],
    folds: &[usize],
    k: usize,
    n_classes: usize,
    params: &ForestParams,
) -> Result<Vec<f64>> {
    (0..k)
        .map(|fold| {
            let (mut x_fit, mut y_fit, mut x_eval, mut y_eval) =
                (Vec::new(), Vec::new(), Vec::new(), Vec::new());
            for (i, &f) in folds.iter().enumerate() {
                if f == fold {
                    x_eval.push(x[i].clone());
                    y_eval.push(y[i]);
                } else {
                    x_fit.push(x[i].clone());
                    y_fit.push(y[i]);
                }
            }
            let model = RandomForestPipeline::fit(&x_fit, &y_fit, n_classes, params)?;
            Ok(accuracy(&y_eval, &model.predict(&x_eval)?))
        })
        .collect()
}

/// Cross-validate every grid combination on `(x, y)` and refit the best.
pub fn grid_search(
    x: &[Vec<f64>],
    y: &[usize],
    encoder: &LabelEncoder,
    grid: &ParamGrid,
    folds: usize,
    seed: u64,
) -> Result<GridSearchResult> {
    let combos = grid.combinations();
    if combos.is_empty() {
        return Err(Error::InvalidParameter {
            name: "param_grid",
            value: "empty".into(),
            reason: "every hyperparameter needs at least one value".into(),
        });
    }
    let n_classes = encoder.n_classes();
    let assignment = stratified_folds(y, folds)?;

    tracing::info!(
        "grid search: {} combination(s) x {} folds on {} samples",
        combos.len(),
        folds,
        y.len()
    );

    let cv_results = combos
        .par_iter()
        .map(|params| {
            let fold_scores =
                score_combination(x, y, &assignment, folds, n_classes, &params.forest_params(seed))?;
            let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            tracing::debug!("{} -> {:.4}", params, mean_score);
            Ok(CvScore {
                params: *params,
                fold_scores,
                mean_score,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut best = &cv_results[0];
    for candidate in &cv_results[1..] {
        if candidate.mean_score > best.mean_score {
            best = candidate;
        }
    }
    let best_params = best.params;
    let best_score = best.mean_score;

    let best_model = RandomForestPipeline::fit(x, y, n_classes, &best_params.forest_params(seed))?;

    Ok(GridSearchResult {
        classes: encoder.classes().to_vec(),
        cv_results,
        best_params,
        best_score,
        best_model,
        validation_accuracy: None,
    })
}

/// Grid search on the training partition, then score the validation partition.
///
/// Logs the chosen hyperparameters and the validation accuracy. No I/O.
pub fn train_random_forest(
    split: &DataSplit,
    encoder: &LabelEncoder,
    grid: &ParamGrid,
    folds: usize,
    seed: u64,
) -> Result<GridSearchResult> {
    let mut result = grid_search(&split.train.x, &split.train.y, encoder, grid, folds, seed)?;
    tracing::info!("best parameters: {}", result.best_params);

    if !split.validation.is_empty() {
        let predicted = result.predict(&split.validation.x)?;
        let acc = accuracy(&split.validation.y, &predicted);
        tracing::info!("validation accuracy: {:.2} %", acc * 100.0);
        result.validation_accuracy = Some(acc);
    }
    Ok(result)
}
