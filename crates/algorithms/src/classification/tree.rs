//! CART decision tree classifier
//!
//! Binary splits on `feature <= threshold`, chosen by the lowest weighted
//! child impurity (Gini or entropy). At each node a random subset of
//! features is examined; if none of them admits a split, the search keeps
//! going through the remaining features.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use lcfuse_core::{Error, Result};

/// Split quality measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    #[default]
    Gini,
    Entropy,
}

impl Criterion {
    fn impurity(self, counts: &[usize], total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let n = total as f64;
        match self {
            Criterion::Gini => {
                1.0 - counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p
                    })
                    .sum::<f64>()
            }
            Criterion::Entropy => counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    -p * p.log2()
                })
                .sum(),
        }
    }
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Criterion::Gini => write!(f, "gini"),
            Criterion::Entropy => write!(f, "entropy"),
        }
    }
}

/// Parameters for a single tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub criterion: Criterion,
    /// Maximum depth; `None` grows until leaves are pure (default: None)
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs to be split (default: 2)
    pub min_samples_split: usize,
    /// Features examined per split; `None` examines all of them
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            criterion: Criterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        class: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

/// A fitted decision tree; nodes live in an arena, root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
    n_classes: usize,
}

struct Grower<'a> {
    x: &'a [Vec<f64>],
    y: &'a [usize],
    n_classes: usize,
    params: &'a TreeParams,
    rng: StdRng,
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Fit on all samples
    pub fn fit(x: &[Vec<f64>], y: &[usize], n_classes: usize, params: &TreeParams) -> Result<Self> {
        let indices: Vec<usize> = (0..x.len()).collect();
        Self::fit_indices(x, y, &indices, n_classes, params)
    }

    /// Fit on the samples at `indices` (repeats allowed, as in a bootstrap sample)
    pub fn fit_indices(
        x: &[Vec<f64>],
        y: &[usize],
        indices: &[usize],
        n_classes: usize,
        params: &TreeParams,
    ) -> Result<Self> {
        let n_features = validate(x, y, n_classes)?;
        if indices.is_empty() {
            return Err(Error::Algorithm("Cannot fit a tree on zero samples".into()));
        }
        let mut grower = Grower {
            x,
            y,
            n_classes,
            params,
            rng: StdRng::seed_from_u64(params.seed),
            nodes: Vec::new(),
        };
        grower.grow(indices.to_vec(), 0);

        Ok(Self {
            nodes: grower.nodes,
            n_features,
            n_classes,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Number of nodes, leaves included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Longest root-to-leaf path (a lone leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        walk(&self.nodes, 0)
    }

    /// Class code for one sample
    pub fn predict_row(&self, row: &[f64]) -> usize {
        let mut id = 0;
        loop {
            match self.nodes[id] {
                Node::Leaf { class } => return class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<usize> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }
}

impl Grower<'_> {
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let mut counts = vec![0usize; self.n_classes];
        for &i in &indices {
            counts[self.y[i]] += 1;
        }
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            class: majority(&counts),
        });

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let too_deep = self.params.max_depth.is_some_and(|d| depth >= d);
        if pure || too_deep || indices.len() < self.params.min_samples_split.max(2) {
            return id;
        }

        let Some(split) = self.best_split(&indices, &counts) else {
            return id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[i][split.feature] <= split.threshold);
        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&mut self, indices: &[usize], counts: &[usize]) -> Option<SplitCandidate> {
        let n_features = self.x[0].len();
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut self.rng);
        let wanted = self.params.max_features.unwrap_or(n_features).clamp(1, n_features);

        let mut best: Option<SplitCandidate> = None;
        for (examined, &feature) in features.iter().enumerate() {
            if examined >= wanted && best.is_some() {
                break;
            }
            if let Some(candidate) = self.best_threshold(feature, indices, counts) {
                if best.as_ref().map_or(true, |b| candidate.impurity < b.impurity) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn best_threshold(&self, feature: usize, indices: &[usize], counts: &[usize]) -> Option<SplitCandidate> {
        let mut pairs: Vec<(f64, usize)> = indices
            .iter()
            .map(|&i| (self.x[i][feature], self.y[i]))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = pairs.len();
        let mut left = vec![0usize; self.n_classes];
        let mut right = counts.to_vec();
        let mut best: Option<SplitCandidate> = None;

        for k in 0..n - 1 {
            let (value, class) = pairs[k];
            left[class] += 1;
            right[class] -= 1;

            let next = pairs[k + 1].0;
            if next <= value {
                continue;
            }
            let n_left = k + 1;
            let n_right = n - n_left;
            let impurity = (n_left as f64 * self.params.criterion.impurity(&left, n_left)
                + n_right as f64 * self.params.criterion.impurity(&right, n_right))
                / n as f64;

            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = value + (next - value) / 2.0;
                // midpoint can round up to `next` for adjacent floats
                if threshold >= next {
                    threshold = value;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
        best
    }
}

/// Most frequent class, lowest code on ties
pub(crate) fn majority(counts: &[usize]) -> usize {
    let mut best = 0;
    for (class, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = class;
        }
    }
    best
}

/// Check shapes and label range; returns the feature count.
pub(crate) fn validate(x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<usize> {
    let Some(first) = x.first() else {
        return Err(Error::Algorithm("Cannot fit on zero samples".into()));
    };
    if x.len() != y.len() {
        return Err(Error::InvalidParameter {
            name: "y",
            value: y.len().to_string(),
            reason: format!("{} samples but {} labels", x.len(), y.len()),
        });
    }
    let p = first.len();
    if p == 0 || x.iter().any(|row| row.len() != p) {
        return Err(Error::Algorithm("Samples must share a non-zero feature count".into()));
    }
    if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
        return Err(Error::InvalidParameter {
            name: "y",
            value: bad.to_string(),
            reason: format!("class code out of range for {} classes", n_classes),
        });
    }
    Ok(p)
}
