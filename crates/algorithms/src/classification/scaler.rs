//! Feature standardization

use serde::{Deserialize, Serialize};

use lcfuse_core::{Error, Result};

/// Per-feature `(x - mean) / std` with the population standard deviation.
///
/// Constant features get a scale of 1 so they map to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &[Vec<f64>]) -> Result<Self> {
        let Some(first) = x.first() else {
            return Err(Error::Algorithm("Cannot fit a scaler on zero samples".into()));
        };
        let p = first.len();
        if x.iter().any(|row| row.len() != p) {
            return Err(Error::Algorithm("Samples have different feature counts".into()));
        }

        let n = x.len() as f64;
        let mut mean = vec![0.0; p];
        for row in x {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; p];
        for row in x {
            for ((s, v), m) in var.iter_mut().zip(row).zip(&mean) {
                *s += (v - m) * (v - m);
            }
        }
        let scale = var
            .into_iter()
            .map(|s| {
                let std = (s / n).sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        x.iter().map(|row| self.transform_row(row)).collect()
    }
}
