//! Point-wise feature extraction
//!
//! Each labelled ground point is sampled at the nearest cell (by coordinate)
//! of the index series and of both radar bands. The feature vector is
//! `[index values..., radar A, radar B]`.

use geo::Geometry;
use lcfuse_core::vector::FeatureCollection;
use lcfuse_core::{Error, Raster, Result, TimeSeries};

use crate::batch::BatchOutcome;

/// A labelled ground-truth location
#[derive(Debug, Clone, PartialEq)]
pub struct GroundPoint {
    pub x: f64,
    pub y: f64,
    pub label: String,
}

impl GroundPoint {
    pub fn new(x: f64, y: f64, label: impl Into<String>) -> Self {
        Self {
            x,
            y,
            label: label.into(),
        }
    }
}

/// Feature vector sampled for one ground point
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSample {
    /// `point_<n>`, 1-based position in the input
    pub key: String,
    pub values: Vec<f64>,
    pub label: String,
}

impl FeatureSample {
    /// Whether every value can be fed to a model
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

impl BatchOutcome<FeatureSample> {
    /// Sample by key
    pub fn get(&self, key: &str) -> Option<&FeatureSample> {
        self.items.iter().find(|s| s.key == key)
    }
}

/// Synthetic key for the point at zero-based `index`
pub fn point_key(index: usize) -> String {
    format!("point_{}", index + 1)
}

/// Ground points from point features, labelled by `label_field`.
///
/// Every feature must carry a point geometry and a non-null label.
pub fn ground_points_from_features(
    collection: &FeatureCollection,
    label_field: &str,
) -> Result<Vec<GroundPoint>> {
    collection
        .iter()
        .enumerate()
        .map(|(i, feature)| {
            let point = match &feature.geometry {
                Some(Geometry::Point(p)) => *p,
                Some(Geometry::MultiPoint(mp)) if mp.0.len() == 1 => mp.0[0],
                Some(_) => {
                    return Err(Error::Vector(format!("feature {} is not a point", i)));
                }
                None => return Err(Error::Vector(format!("feature {} has no geometry", i))),
            };
            let label = feature.label(label_field).ok_or_else(|| {
                Error::Vector(format!("feature {} has no '{}' attribute", i, label_field))
            })?;
            Ok(GroundPoint::new(point.x(), point.y(), label))
        })
        .collect()
}

fn sample_point(
    point: &GroundPoint,
    index: &TimeSeries,
    radar_a: &Raster<f64>,
    radar_b: &Raster<f64>,
) -> Result<Vec<f64>> {
    let mut values = index.sample(point.x, point.y)?;
    values.push(radar_a.sample(point.x, point.y)?);
    values.push(radar_b.sample(point.x, point.y)?);
    Ok(values)
}

/// Sample every point; a point that fails on any source is skipped with the reason.
///
/// Every extracted vector has `index.n_times() + 2` values.
pub fn extract_point_features(
    points: &[GroundPoint],
    index: &TimeSeries,
    radar_a: &Raster<f64>,
    radar_b: &Raster<f64>,
) -> BatchOutcome<FeatureSample> {
    let mut outcome = BatchOutcome::new();
    for (i, point) in points.iter().enumerate() {
        let key = point_key(i);
        match sample_point(point, index, radar_a, radar_b) {
            Ok(values) => outcome.push(FeatureSample {
                key,
                values,
                label: point.label.clone(),
            }),
            Err(e) => {
                tracing::warn!("{} ({}, {}) skipped: {}", key, point.x, point.y, e);
                outcome.skip(key, e);
            }
        }
    }

    tracing::info!(
        extracted = outcome.len(),
        skipped = outcome.skipped.len(),
        "point features extracted"
    );
    outcome
}
