//! Quality masking from a categorical scene-classification band
//!
//! The mask is the pixel-wise OR of `category == code` over the set of good
//! codes. Masked-out cells of every other band become NaN.

use lcfuse_core::{Error, RasterCube, Result, TimeSeries};
use ndarray::{Array3, Zip};

/// Sentinel-2 L2A scene classification (SCL) values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneClass {
    NoData = 0,
    SaturatedOrDefective = 1,
    DarkAreaPixels = 2,
    CloudShadows = 3,
    Vegetation = 4,
    NotVegetated = 5,
    Water = 6,
    Unclassified = 7,
    CloudMediumProbability = 8,
    CloudHighProbability = 9,
    ThinCirrus = 10,
    Snow = 11,
}

impl SceneClass {
    pub const ALL: [SceneClass; 12] = [
        SceneClass::NoData,
        SceneClass::SaturatedOrDefective,
        SceneClass::DarkAreaPixels,
        SceneClass::CloudShadows,
        SceneClass::Vegetation,
        SceneClass::NotVegetated,
        SceneClass::Water,
        SceneClass::Unclassified,
        SceneClass::CloudMediumProbability,
        SceneClass::CloudHighProbability,
        SceneClass::ThinCirrus,
        SceneClass::Snow,
    ];

    /// Codes kept as clear observations: dark area, vegetation, not vegetated, water
    pub const DEFAULT_GOOD: [u8; 4] = [2, 4, 5, 6];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            SceneClass::NoData => "no data",
            SceneClass::SaturatedOrDefective => "saturated or defective",
            SceneClass::DarkAreaPixels => "dark area pixels",
            SceneClass::CloudShadows => "cloud shadows",
            SceneClass::Vegetation => "vegetation",
            SceneClass::NotVegetated => "not vegetated",
            SceneClass::Water => "water",
            SceneClass::Unclassified => "unclassified",
            SceneClass::CloudMediumProbability => "cloud medium probability",
            SceneClass::CloudHighProbability => "cloud high probability",
            SceneClass::ThinCirrus => "thin cirrus",
            SceneClass::Snow => "snow or ice",
        }
    }

    /// The flag table: `(code, name)` for every class
    pub fn describe() -> Vec<(u8, &'static str)> {
        Self::ALL.iter().map(|c| (c.code(), c.name())).collect()
    }
}

/// Boolean mask, `(time, row, col)`, true = pixel retained.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityMask {
    mask: Array3<bool>,
}

impl QualityMask {
    pub fn as_array(&self) -> &Array3<bool> {
        &self.mask
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.mask.dim()
    }

    /// Fraction of retained cells
    pub fn retained_fraction(&self) -> f64 {
        if self.mask.is_empty() {
            return 0.0;
        }
        self.mask.iter().filter(|&&keep| keep).count() as f64 / self.mask.len() as f64
    }
}

/// Pixel-wise "category is any of `good`".
///
/// Codes that never occur in the band simply contribute no true cells;
/// NaN categories are never good.
pub fn enum_to_bool(categories: &TimeSeries, good: &[u8]) -> QualityMask {
    let mask = categories.data().mapv(|v| {
        !v.is_nan() && good.iter().any(|&code| v == f64::from(code))
    });
    QualityMask { mask }
}

/// Apply a mask to one band: masked-out cells become NaN.
pub fn mask_series(series: &TimeSeries, mask: &QualityMask) -> Result<TimeSeries> {
    if series.shape() != mask.shape() {
        let (_, er, ec) = mask.shape();
        let (_, ar, ac) = series.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }
    let mut data = series.data().clone();
    Zip::from(&mut data).and(&mask.mask).for_each(|v, &keep| {
        if !keep {
            *v = f64::NAN;
        }
    });
    series.with_data(data)
}

/// Mask every band of the cube except the quality band itself, which is dropped.
pub fn apply_mask(cube: &RasterCube, mask: &QualityMask, quality_band: &str) -> Result<RasterCube> {
    let mut out = RasterCube::new();
    for (name, series) in cube.iter().filter(|(name, _)| *name != quality_band) {
        out.insert(name, mask_series(series, mask)?)?;
    }
    Ok(out)
}

/// Build the mask from the cube's quality band and apply it.
pub fn mask_clean(cube: &RasterCube, quality_band: &str, good: &[u8]) -> Result<RasterCube> {
    let mask = enum_to_bool(cube.band(quality_band)?, good);
    tracing::info!(
        retained = format!("{:.1}%", 100.0 * mask.retained_fraction()),
        "quality mask built from '{}'",
        quality_band
    );
    apply_mask(cube, &mask, quality_band)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lcfuse_core::GeoTransform;
    use ndarray::array;

    fn single_step(values: ndarray::Array2<f64>) -> TimeSeries {
        let (rows, cols) = values.dim();
        TimeSeries::new(
            values.into_shape_with_order((1, rows, cols)).unwrap(),
            vec![NaiveDate::from_ymd_opt(2023, 3, 1).unwrap()],
            GeoTransform::default(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_mask_is_membership_in_good_set() {
        let scl = single_step(array![[4.0, 9.0, 2.0], [3.0, 6.0, f64::NAN]]);
        let mask = enum_to_bool(&scl, &SceneClass::DEFAULT_GOOD);
        for (cat, keep) in scl.data().iter().zip(mask.as_array().iter()) {
            let expected = !cat.is_nan() && SceneClass::DEFAULT_GOOD.contains(&(*cat as u8));
            assert_eq!(*keep, expected);
        }
    }

    #[test]
    fn test_absent_code_does_not_error() {
        let scl = single_step(array![[4.0, 4.0]]);
        let mask = enum_to_bool(&scl, &[11, 4]);
        assert!(mask.as_array().iter().all(|&b| b));
        let none = enum_to_bool(&scl, &[11]);
        assert!(none.as_array().iter().all(|&b| !b));
    }

    #[test]
    fn test_two_by_two_scenario() {
        let scl = single_step(array![[4.0, 9.0], [8.0, 5.0]]);
        let red = single_step(array![[0.1, 0.2], [0.3, 0.4]]);
        let mask = enum_to_bool(&scl, &[2, 4, 5, 6]);
        assert_eq!(
            mask.as_array().index_axis(ndarray::Axis(0), 0),
            array![[true, false], [false, true]]
        );

        let masked = mask_series(&red, &mask).unwrap();
        let d = masked.data();
        assert_eq!(d[[0, 0, 0]], 0.1);
        assert!(d[[0, 0, 1]].is_nan());
        assert!(d[[0, 1, 0]].is_nan());
        assert_eq!(d[[0, 1, 1]], 0.4);
    }

    #[test]
    fn test_apply_mask_drops_quality_band() {
        let mut cube = RasterCube::new();
        cube.insert("red", single_step(array![[1.0, 2.0]])).unwrap();
        cube.insert("scl", single_step(array![[4.0, 9.0]])).unwrap();
        let clean = mask_clean(&cube, "scl", &SceneClass::DEFAULT_GOOD).unwrap();
        assert_eq!(clean.band_names(), vec!["red"]);
        assert!(clean.band("red").unwrap().data()[[0, 0, 1]].is_nan());
    }

    #[test]
    fn test_describe_flags() {
        let table = SceneClass::describe();
        assert_eq!(table.len(), 12);
        assert_eq!(table[4], (4, "vegetation"));
        assert_eq!(SceneClass::from_code(12), None);
    }
}
