//! End-to-end stages wired from a [`PipelineConfig`]
//!
//! Each function is one step a user runs: build the index series, train,
//! predict, compare. File paths stay with the caller; models and results are
//! written only by the explicit persistence and output functions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use geo::Geometry;
use lcfuse_core::vector::FeatureCollection;
use lcfuse_core::{Error, Raster, RasterCube, Result, TimeSeries, CRS};

use crate::acquisition::{CubeQuery, CubeSource, LoadParams};
use crate::batch::{BatchOutcome, Skipped};
use crate::classification::{
    accuracy, classification_report, load_model, map_labels, save_model, train_random_forest,
    train_val_test_split, DataSplit, GridSearchResult, LabelEncoder,
};
use crate::config::PipelineConfig;
use crate::features::{extract_point_features, ground_points_from_features, FeatureSample};
use crate::gapfill::fill_gaps;
use crate::imagery::compute_index;
use crate::inference::predict_grid;
use crate::masking::mask_clean;
use crate::postprocess::{clip_to_boundary, compare, CategoryClips};
use crate::temporal::aggregate;

/// A fitted model together with the CRS of the data it was trained on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub search: GridSearchResult,
    pub crs: Option<CRS>,
}

impl TrainedModel {
    pub fn save(&self, dir: impl AsRef<Path>, name: &str) -> Result<PathBuf> {
        save_model(dir, name, self)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_model(path)
    }
}

/// Result of a training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub split: DataSplit,
    /// Accuracy on the held-out test partition
    pub test_accuracy: f64,
    /// Points that could not be sampled or had incomplete features
    pub skipped: Vec<Skipped>,
}

/// Load, mask, compute the index, gap-fill and aggregate.
pub fn build_index_series(
    source: &dyn CubeSource,
    query: &CubeQuery,
    params: &LoadParams,
    config: &PipelineConfig,
) -> Result<TimeSeries> {
    let cube = source.load(query, params)?;
    index_series_from_cube(&cube, config)
}

/// The in-memory part of [`build_index_series`]
pub fn index_series_from_cube(cube: &RasterCube, config: &PipelineConfig) -> Result<TimeSeries> {
    let clean = mask_clean(cube, &config.quality_band, &config.good_quality_codes)?;
    let index = compute_index(&clean, config.index)?;
    let splits = config.splits_for(index.times());
    let filled = fill_gaps(&index, &splits, config.fill_order)?;
    let aggregated = aggregate(&filled, config.aggregation)?;
    tracing::info!(
        "{:?} series: {} step(s) after filling, {} after aggregation, {} missing value(s)",
        config.index,
        filled.n_times(),
        aggregated.n_times(),
        aggregated.missing_count()
    );
    Ok(aggregated)
}

/// Sample features at the ground points and fit the model.
///
/// Points are reprojected to the index CRS first; the radar rasters must
/// share that CRS. The label encoder is fitted on the mapped labels of every
/// point, including points later skipped, so codes do not depend on which
/// points sampled.
pub fn train(
    index: &TimeSeries,
    points: &FeatureCollection,
    radar_a: &Raster<f64>,
    radar_b: &Raster<f64>,
    config: &PipelineConfig,
) -> Result<TrainingOutcome> {
    let points = in_crs(points, index.crs())?;
    let ground = ground_points_from_features(&points, &config.label_field)?;
    let raw: Vec<&str> = ground.iter().map(|p| p.label.as_str()).collect();
    let mapped: Vec<String> = if config.label_mapping.is_empty() {
        raw.iter().map(|s| s.to_string()).collect()
    } else {
        map_labels(&raw, &config.label_mapping)?
    };
    let encoder = LabelEncoder::fit(&mapped);

    let samples = extract_point_features(&ground, index, radar_a, radar_b);
    let mut skipped = samples.skipped.clone();
    let mut x = Vec::with_capacity(samples.len());
    let mut labels = Vec::with_capacity(samples.len());
    for (i, sample) in ground_order(&samples) {
        if !sample.is_finite() {
            tracing::warn!("{} has missing feature values, left out of training", sample.key);
            skipped.push(Skipped {
                key: sample.key.clone(),
                reason: "non-finite feature value".into(),
            });
            continue;
        }
        x.push(sample.values.clone());
        labels.push(mapped[i].as_str());
    }
    if x.is_empty() {
        return Err(Error::Algorithm("No usable training samples".into()));
    }
    let y = encoder.transform(&labels)?;

    let split = train_val_test_split(&x, &y, config.seed)?;
    let search = train_random_forest(&split, &encoder, &config.param_grid, config.cv_folds, config.seed)?;

    let predicted = search.predict(&split.test.x)?;
    let test_accuracy = accuracy(&split.test.y, &predicted);
    tracing::info!("test accuracy: {:.2} %", test_accuracy * 100.0);
    tracing::debug!(
        "\n{}",
        classification_report(&split.test.y, &predicted, encoder.classes())
    );

    Ok(TrainingOutcome {
        model: TrainedModel {
            search,
            crs: points.crs.clone().or_else(|| index.crs().cloned()),
        },
        split,
        test_accuracy,
        skipped,
    })
}

/// `collection` reprojected to `target` when both CRSs are known and differ
fn in_crs(collection: &FeatureCollection, target: Option<&CRS>) -> Result<FeatureCollection> {
    match (&collection.crs, target) {
        (Some(from), Some(to)) if !from.is_equivalent(to) => collection.to_crs(to),
        _ => Ok(collection.clone()),
    }
}

/// Samples paired with the position of their ground point
fn ground_order(samples: &BatchOutcome<FeatureSample>) -> Vec<(usize, &FeatureSample)> {
    samples
        .items
        .iter()
        .filter_map(|s| {
            s.key
                .strip_prefix("point_")
                .and_then(|n| n.parse::<usize>().ok())
                .and_then(|n| n.checked_sub(1))
                .map(|i| (i, s))
        })
        .collect()
}

/// Predict over the index grid, optionally clipped to a boundary polygon.
pub fn predict(
    model: &TrainedModel,
    index: &TimeSeries,
    radar_a: &Raster<f64>,
    radar_b: &Raster<f64>,
    boundary: Option<(&Geometry<f64>, Option<&CRS>)>,
) -> Result<Raster<f64>> {
    let prediction = predict_grid(&model.search, index, radar_a, radar_b, model.crs.as_ref())?;
    match boundary {
        Some((geom, crs)) => clip_to_boundary(&prediction, geom, crs),
        None => Ok(prediction),
    }
}

/// Compare a prediction with reference polygons by category.
///
/// The reference is reprojected to the prediction CRS when both are known.
pub fn compare_prediction(
    prediction: &Raster<f64>,
    reference: &FeatureCollection,
    config: &PipelineConfig,
) -> Result<BatchOutcome<CategoryClips>> {
    let reference = in_crs(reference, prediction.crs())?;
    let rules = config.compare_rules()?;
    let outcome = compare(
        prediction,
        &reference,
        &config.reference_label_field,
        &config.categories,
        &config.code_map,
        &rules,
    );
    tracing::info!(
        "compared {} polygon(s) over {} categories, {} clip(s) skipped",
        reference.len(),
        outcome.len(),
        outcome.skipped.len()
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, LineString};
    use lcfuse_core::crs::reproject_point;
    use lcfuse_core::vector::{AttributeValue, Feature};
    use lcfuse_core::GeoTransform;
    use ndarray::Array2;

    #[test]
    fn test_ground_order_follows_keys() {
        let mut outcome = BatchOutcome::new();
        for key in ["point_1", "point_3"] {
            outcome.push(FeatureSample {
                key: key.into(),
                values: vec![0.0],
                label: "a".into(),
            });
        }
        let order: Vec<usize> = ground_order(&outcome).iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 2]);
    }

    #[test]
    fn test_compare_reprojects_reference() {
        let utm = CRS::utm(48, true);
        let (e, n) = reproject_point(105.0, 10.5, &CRS::wgs84(), &utm).unwrap();
        let mut prediction = Raster::filled(10, 10, 2.0);
        prediction.set_transform(GeoTransform::new(e - 50.0, n + 50.0, 10.0, -10.0));
        prediction.set_crs(Some(utm));

        let mut reference = FeatureCollection::new();
        reference.crs = Some(CRS::wgs84());
        let mut f = Feature::new(Geometry::Polygon(geo::polygon![
            (x: 104.99, y: 10.49), (x: 105.01, y: 10.49), (x: 105.01, y: 10.51),
            (x: 104.99, y: 10.51), (x: 104.99, y: 10.49)
        ]));
        f.set_property("tenchu", AttributeValue::String("forest".into()));
        reference.push(f);

        let config: PipelineConfig = serde_json::from_str(
            r#"{
                "categories": [
                    {"key": "TQ", "name": "other", "codes": [0.0]},
                    {"key": "PNN", "name": "farmland", "codes": [1.0]},
                    {"key": "RSX", "name": "forest", "codes": [2.0, 4.0]}
                ],
                "code_map": {"forest": 4.0}
            }"#,
        )
        .unwrap();

        let outcome = compare_prediction(&prediction, &reference, &config).unwrap();
        assert!(outcome.skipped.is_empty());
        let forest = &outcome.items[2];
        assert_eq!(forest.rasters.len(), 1);
        // expected 4 is masked, predicted 2 survives
        assert!(forest.rasters[0].data().iter().all(|v| *v == 2.0));
        assert!(outcome.items[0].rasters[0].data().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_compare_reference_in_vn2000_tm3() {
        let utm = CRS::utm(48, true);
        let tm3 = CRS::from_epsg(9209);
        let (e, n) = reproject_point(107.5786, 16.4698, &CRS::wgs84(), &utm).unwrap();
        let (e0, n0) = ((e / 10.0).floor() * 10.0, (n / 10.0).floor() * 10.0);

        // forest (1) on the left half, farmland (0) on the right
        let mut prediction =
            Raster::from_array(Array2::from_shape_fn((10, 10), |(_, c)| if c < 5 { 1.0 } else { 0.0 }));
        prediction.set_transform(GeoTransform::new(e0, n0 + 100.0, 10.0, -10.0));
        prediction.set_crs(Some(utm.clone()));

        // the left half as surveyed in TM-3, inset 1 m
        let ring: Vec<(f64, f64)> = [(1.0, 1.0), (49.0, 1.0), (49.0, 99.0), (1.0, 99.0), (1.0, 1.0)]
            .iter()
            .map(|&(dx, dy)| reproject_point(e0 + dx, n0 + dy, &utm, &tm3).unwrap())
            .collect();
        assert!(ring.iter().all(|&(x, _)| x > 600_000.0));

        let mut reference = FeatureCollection::new();
        reference.crs = Some(tm3);
        let mut f = Feature::new(Geometry::Polygon(geo::Polygon::new(LineString::from(ring), vec![])));
        f.set_property("tenchu", AttributeValue::String("forest".into()));
        reference.push(f);

        let config: PipelineConfig = serde_json::from_str(
            r#"{
                "categories": [
                    {"key": "TQ", "name": "other", "codes": [5.0]},
                    {"key": "PNN", "name": "farmland", "codes": [0.0]},
                    {"key": "RSX", "name": "forest", "codes": [1.0, 2.0]}
                ],
                "code_map": {"forest": 2.0}
            }"#,
        )
        .unwrap();

        let outcome = compare_prediction(&prediction, &reference, &config).unwrap();
        assert!(outcome.skipped.is_empty());
        let forest = &outcome.items[2].rasters[0];
        assert_eq!(forest.shape(), (10, 5));
        assert!(forest.data().iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_compare_unsupported_reference_crs() {
        let mut prediction = Raster::filled(2, 2, 1.0);
        prediction.set_crs(Some(CRS::utm(48, true)));
        let mut reference = FeatureCollection::new();
        reference.crs = Some(CRS::from_epsg(3857));
        reference.push(Feature::new(Geometry::Point(geo::Point::new(0.0, 0.0))));
        assert!(compare_prediction(&prediction, &reference, &PipelineConfig::default()).is_err());
    }
}
