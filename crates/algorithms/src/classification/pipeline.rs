//! Standardization followed by a random forest

use serde::{Deserialize, Serialize};

use lcfuse_core::{Error, Result};

use super::forest::{ForestParams, RandomForest};
use super::scaler::StandardScaler;

/// Scaler + forest, fitted together and applied in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestPipeline {
    scaler: StandardScaler,
    forest: RandomForest,
}

impl RandomForestPipeline {
    pub fn fit(x: &[Vec<f64>], y: &[usize], n_classes: usize, params: &ForestParams) -> Result<Self> {
        let scaler = StandardScaler::fit(x)?;
        let forest = RandomForest::fit(&scaler.transform(x), y, n_classes, params)?;
        Ok(Self { scaler, forest })
    }

    pub fn n_features(&self) -> usize {
        self.scaler.n_features()
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<usize> {
        if row.len() != self.n_features() {
            return Err(Error::InvalidParameter {
                name: "features",
                value: row.len().to_string(),
                reason: format!("model expects {} features", self.n_features()),
            });
        }
        Ok(self.forest.predict_row(&self.scaler.transform_row(row)))
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<usize>> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_invariant_prediction() {
        // second feature carries the signal at a large scale
        let x: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![(i % 3) as f64, if i < 10 { 1000.0 } else { 5000.0 } + i as f64])
            .collect();
        let y: Vec<usize> = (0..20).map(|i| usize::from(i >= 10)).collect();
        let params = ForestParams {
            n_estimators: 10,
            max_features: Some(2),
            ..Default::default()
        };
        let model = RandomForestPipeline::fit(&x, &y, 2, &params).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
        assert_eq!(model.predict_row(&[0.0, 4800.0]).unwrap(), 1);
        assert!(model.predict_row(&[1.0]).is_err());
    }
}
