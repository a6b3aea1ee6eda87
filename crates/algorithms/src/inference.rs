//! Grid inference: predict a class code for every cell of the index grid
//!
//! Features are assembled row by row in the training order
//! `[index values..., radar A, radar B]`. Radar rows and columns are matched
//! to the index grid by nearest coordinate, so the radar rasters may sit on a
//! different resolution or extent.

use crate::classification::GridSearchResult;
use crate::maybe_rayon::*;
use lcfuse_core::{Error, Raster, Result, TimeSeries, CRS};

/// Index of the nearest radar row/column for each index coordinate; `None` outside
fn match_axis(coords: &[f64], nearest: impl Fn(f64) -> Result<usize>) -> Vec<Option<usize>> {
    coords.iter().map(|&c| nearest(c).ok()).collect()
}

/// Predict a class-code raster on the grid of `index`.
///
/// Cells whose features are not all finite, or that fall outside a radar
/// raster, are NaN. The output takes `training_crs` first and is then
/// overwritten by the CRS of `index` when it has one.
pub fn predict_grid(
    model: &GridSearchResult,
    index: &TimeSeries,
    radar_a: &Raster<f64>,
    radar_b: &Raster<f64>,
    training_crs: Option<&CRS>,
) -> Result<Raster<f64>> {
    let n_features = index.n_times() + 2;
    if model.n_features() != n_features {
        return Err(Error::InvalidParameter {
            name: "index",
            value: format!("{} time step(s)", index.n_times()),
            reason: format!(
                "model was trained on {} features, grid provides {}",
                model.n_features(),
                n_features
            ),
        });
    }

    let (rows, cols) = index.grid_shape();
    let xs = index.x_coords();
    let ys = index.y_coords();
    let a_cols = match_axis(&xs, |x| radar_a.nearest_col(x));
    let b_cols = match_axis(&xs, |x| radar_b.nearest_col(x));
    let a_rows = match_axis(&ys, |y| radar_a.nearest_row(y));
    let b_rows = match_axis(&ys, |y| radar_b.nearest_row(y));

    let radar_value = |raster: &Raster<f64>, row: Option<usize>, col: Option<usize>| match (row, col) {
        (Some(r), Some(c)) => raster.get(r, c).unwrap_or(f64::NAN),
        _ => f64::NAN,
    };

    let row_predictions = (0..rows)
        .into_par_iter()
        .map(|row| {
            let block = index.row_block(row);
            let mut out = vec![f64::NAN; cols];
            let mut features = Vec::with_capacity(n_features);
            for col in 0..cols {
                features.clear();
                features.extend(block.column(col).iter().copied());
                features.push(radar_value(radar_a, a_rows[row], a_cols[col]));
                features.push(radar_value(radar_b, b_rows[row], b_cols[col]));
                if features.iter().all(|v| v.is_finite()) {
                    out[col] = model.predict_row(&features)? as f64;
                }
            }
            Ok(out)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let data: Vec<f64> = row_predictions.into_iter().flatten().collect();
    let mut raster = Raster::from_vec(data, rows, cols)?;
    raster.set_transform(*index.transform());
    raster.set_nodata(Some(f64::NAN));
    raster.set_crs(training_crs.cloned());
    if let Some(crs) = index.crs() {
        raster.set_crs(Some(crs.clone()));
    }

    let predicted = raster.data().iter().filter(|v| !v.is_nan()).count();
    tracing::info!("predicted {} of {} cell(s)", predicted, rows * cols);
    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{grid_search, Criterion, LabelEncoder, ParamGrid};
    use chrono::NaiveDate;
    use lcfuse_core::GeoTransform;
    use ndarray::{Array2, Array3};

    fn model() -> GridSearchResult {
        // class "high" when the index value is large; radar values carry no signal
        let labels: Vec<&str> = (0..20).map(|i| if i < 10 { "low" } else { "high" }).collect();
        let (encoder, y) = LabelEncoder::fit_transform(&labels);
        let x: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![if i < 10 { 0.1 } else { 0.9 }, -10.0, -10.0])
            .collect();
        let grid = ParamGrid {
            n_estimators: vec![5],
            max_depth: vec![3],
            criterion: vec![Criterion::Gini],
        };
        grid_search(&x, &y, &encoder, &grid, 5, 42).unwrap()
    }

    fn index(crs: Option<CRS>) -> TimeSeries {
        // left column low, right column high, one missing cell
        let mut data = Array3::from_shape_fn((1, 2, 2), |(_, _, c)| if c == 0 { 0.1 } else { 0.9 });
        data[[0, 1, 0]] = f64::NAN;
        let times = vec![NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()];
        TimeSeries::new(data, times, GeoTransform::new(0.0, 20.0, 10.0, -10.0), crs).unwrap()
    }

    fn radar(cols: usize) -> Raster<f64> {
        let mut r = Raster::from_array(Array2::from_elem((1, cols), -10.0));
        r.set_transform(GeoTransform::new(0.0, 20.0, 10.0, -20.0));
        r
    }

    #[test]
    fn test_predicts_codes_and_nan() {
        let model = model();
        let high = LabelEncoder::fit(&model.classes).code("high").unwrap() as f64;
        let low = LabelEncoder::fit(&model.classes).code("low").unwrap() as f64;

        let out = predict_grid(&model, &index(None), &radar(2), &radar(2), None).unwrap();
        assert_eq!(out.shape(), (2, 2));
        assert_eq!(out.get(0, 0).unwrap(), low);
        assert_eq!(out.get(0, 1).unwrap(), high);
        assert!(out.get(1, 0).unwrap().is_nan());
        assert_eq!(out.get(1, 1).unwrap(), high);
    }

    #[test]
    fn test_cells_outside_radar_are_nan() {
        let out = predict_grid(&model(), &index(None), &radar(1), &radar(2), None).unwrap();
        assert!(!out.get(0, 0).unwrap().is_nan());
        assert!(out.get(0, 1).unwrap().is_nan());
    }

    #[test]
    fn test_index_crs_wins() {
        let training = CRS::from_epsg(32648);
        let out = predict_grid(&model(), &index(None), &radar(2), &radar(2), Some(&training)).unwrap();
        assert_eq!(out.crs(), Some(&training));

        let own = CRS::from_epsg(32649);
        let out = predict_grid(&model(), &index(Some(own.clone())), &radar(2), &radar(2), Some(&training))
            .unwrap();
        assert_eq!(out.crs(), Some(&own));
    }

    #[test]
    fn test_feature_count_mismatch() {
        let data = Array3::from_elem((2, 1, 1), 0.5);
        let times = vec![
            NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 7, 1).unwrap(),
        ];
        let two_steps = TimeSeries::new(data, times, GeoTransform::default(), None).unwrap();
        assert!(predict_grid(&model(), &two_steps, &radar(1), &radar(1), None).is_err());
    }
}
