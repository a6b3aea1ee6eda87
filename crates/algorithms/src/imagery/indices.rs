//! Spectral vegetation and water indices
//!
//! Each index is a cell-wise formula over a few reflectance bands.
//! [`index_layer`] evaluates one on single rasters, [`compute_index`] on every
//! time step of a [`RasterCube`].

use crate::maybe_rayon::*;
use lcfuse_core::raster::Raster;
use lcfuse_core::{Error, RasterCube, Result, TimeSeries};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Soil brightness correction factor of SAVI
const SAVI_L: f64 = 0.5;

/// EVI coefficients: gain, red and blue aerosol terms, canopy background
const EVI_G: f64 = 2.5;
const EVI_C1: f64 = 6.0;
const EVI_C2: f64 = 7.5;
const EVI_L: f64 = 1.0;

/// Denominators closer to zero than this give NaN
const MIN_DENOMINATOR: f64 = 1e-10;

/// Supported spectral indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpectralIndex {
    /// `(nir - red) / (nir + red)`
    #[default]
    NDVI,
    /// McFeeters water index, `(green - nir) / (green + nir)`
    NDWI,
    /// `(nir - green) / (nir + green)`
    GNDVI,
    /// `(nir - red) / (nir + red + L) * (1 + L)`
    SAVI,
    /// `G * (nir - red) / (nir + C1 * red - C2 * blue + L)`
    EVI,
}

impl SpectralIndex {
    /// Band names the index reads from a cube, in [`evaluate`](Self::evaluate) order
    pub fn required_bands(self) -> &'static [&'static str] {
        match self {
            SpectralIndex::NDVI | SpectralIndex::SAVI => &["nir", "red"],
            SpectralIndex::NDWI => &["green", "nir"],
            SpectralIndex::GNDVI => &["nir", "green"],
            SpectralIndex::EVI => &["nir", "red", "blue"],
        }
    }

    /// Index value for one cell; NaN when an input is NaN or the
    /// denominator vanishes.
    pub fn evaluate(self, bands: &[f64]) -> f64 {
        if bands.len() < self.required_bands().len() || bands.iter().any(|v| v.is_nan()) {
            return f64::NAN;
        }
        let (numerator, denominator, scale) = match self {
            SpectralIndex::NDVI | SpectralIndex::NDWI | SpectralIndex::GNDVI => {
                (bands[0] - bands[1], bands[0] + bands[1], 1.0)
            }
            SpectralIndex::SAVI => (bands[0] - bands[1], bands[0] + bands[1] + SAVI_L, 1.0 + SAVI_L),
            SpectralIndex::EVI => (
                bands[0] - bands[1],
                bands[0] + EVI_C1 * bands[1] - EVI_C2 * bands[2] + EVI_L,
                EVI_G,
            ),
        };
        if denominator.abs() < MIN_DENOMINATOR {
            return f64::NAN;
        }
        scale * numerator / denominator
    }
}

impl std::str::FromStr for SpectralIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NDVI" => Ok(SpectralIndex::NDVI),
            "NDWI" => Ok(SpectralIndex::NDWI),
            "GNDVI" => Ok(SpectralIndex::GNDVI),
            "SAVI" => Ok(SpectralIndex::SAVI),
            "EVI" => Ok(SpectralIndex::EVI),
            _ => Err(Error::InvalidParameter {
                name: "index",
                value: s.to_string(),
                reason: "expected one of NDVI, NDWI, GNDVI, SAVI, EVI".into(),
            }),
        }
    }
}

/// Evaluate `index` on single-band rasters given in `required_bands` order.
///
/// No-data cells of any input are NaN in the output, which takes the
/// georeferencing of the first band.
pub fn index_layer(index: SpectralIndex, bands: &[&Raster<f64>]) -> Result<Raster<f64>> {
    let needed = index.required_bands().len();
    if bands.len() != needed {
        return Err(Error::InvalidParameter {
            name: "bands",
            value: bands.len().to_string(),
            reason: format!("{:?} needs {} band(s)", index, needed),
        });
    }
    let first = bands[0];
    for band in &bands[1..] {
        if band.shape() != first.shape() {
            return Err(Error::SizeMismatch {
                er: first.rows(),
                ec: first.cols(),
                ar: band.rows(),
                ac: band.cols(),
            });
        }
    }

    let (rows, cols) = first.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut cell = [f64::NAN; 3];
            (0..cols)
                .map(|col| {
                    for (k, band) in bands.iter().enumerate() {
                        let v = band.data()[(row, col)];
                        cell[k] = if band.is_nodata(v) { f64::NAN } else { v };
                    }
                    index.evaluate(&cell[..needed])
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    let mut out = first.with_data(data)?;
    out.set_nodata(Some(f64::NAN));
    Ok(out)
}

/// Compute an index for every time step of a cube.
///
/// Missing inputs (NaN) propagate; the result shares the cube's time axis and grid.
pub fn compute_index(cube: &RasterCube, index: SpectralIndex) -> Result<TimeSeries> {
    let bands = index
        .required_bands()
        .iter()
        .map(|name| cube.band(name))
        .collect::<Result<Vec<_>>>()?;
    let reference = bands[0];
    let (n_times, rows, cols) = reference.shape();
    if let Some(other) = bands.iter().find(|b| b.shape() != reference.shape()) {
        let (_, ar, ac) = other.shape();
        return Err(Error::SizeMismatch { er: rows, ec: cols, ar, ac });
    }

    let arrays: Vec<&Array3<f64>> = bands.iter().map(|b| b.data()).collect();
    let data: Vec<f64> = (0..n_times * rows)
        .into_par_iter()
        .flat_map(|lane| {
            let (t, row) = (lane / rows, lane % rows);
            let mut cell = [f64::NAN; 3];
            (0..cols)
                .map(|col| {
                    for (k, a) in arrays.iter().enumerate() {
                        cell[k] = a[[t, row, col]];
                    }
                    index.evaluate(&cell[..arrays.len()])
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let data = Array3::from_shape_vec((n_times, rows, cols), data)
        .map_err(|e| Error::Other(e.to_string()))?;
    tracing::debug!("{:?} computed over {} time step(s)", index, n_times);
    reference.with_data(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use lcfuse_core::GeoTransform;

    fn make_band(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(rows, cols, value);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r
    }

    fn make_series(values: &[f64]) -> TimeSeries {
        let layers = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                (
                    NaiveDate::from_ymd_opt(2023, 1, 1 + i as u32).unwrap(),
                    make_band(3, 3, *v),
                )
            })
            .collect();
        TimeSeries::from_layers(layers).unwrap()
    }

    #[test]
    fn test_normalized_difference() {
        assert_relative_eq!(SpectralIndex::NDVI.evaluate(&[0.8, 0.2]), 0.6, epsilon = 1e-12);
        // water: green above nir
        assert!(SpectralIndex::NDWI.evaluate(&[0.15, 0.05]) > 0.0);
        assert!(SpectralIndex::NDVI.evaluate(&[0.0, 0.0]).is_nan());
        assert!(SpectralIndex::NDVI.evaluate(&[f64::NAN, 0.2]).is_nan());
    }

    #[test]
    fn test_savi_and_evi() {
        let savi = SpectralIndex::SAVI.evaluate(&[0.5, 0.1]);
        assert_relative_eq!(savi, (0.4 / 1.1) * 1.5, epsilon = 1e-12);
        let evi = SpectralIndex::EVI.evaluate(&[0.5, 0.1, 0.05]);
        assert_relative_eq!(evi, 2.5 * 0.4 / (0.5 + 0.6 - 0.375 + 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_index_layer_nodata() {
        let mut nir = make_band(5, 5, 0.5);
        nir.set_nodata(Some(-9999.0));
        nir.set(2, 2, -9999.0).unwrap();
        let red = make_band(5, 5, 0.1);
        let out = index_layer(SpectralIndex::NDVI, &[&nir, &red]).unwrap();
        assert!(out.get(2, 2).unwrap().is_nan());
        assert_relative_eq!(out.get(0, 0).unwrap(), 0.4 / 0.6, epsilon = 1e-12);
        assert_eq!(out.transform(), nir.transform());
    }

    #[test]
    fn test_index_layer_checks_inputs() {
        let a = make_band(5, 5, 1.0);
        let b = make_band(5, 10, 1.0);
        assert!(index_layer(SpectralIndex::NDVI, &[&a, &b]).is_err());
        assert!(index_layer(SpectralIndex::EVI, &[&a, &a]).is_err());
    }

    #[test]
    fn test_compute_index_over_time() {
        let mut cube = RasterCube::new();
        cube.insert("nir", make_series(&[0.5, 0.6, f64::NAN])).unwrap();
        cube.insert("red", make_series(&[0.1, 0.2, 0.1])).unwrap();

        let ts = compute_index(&cube, SpectralIndex::NDVI).unwrap();
        assert_eq!(ts.shape(), (3, 3, 3));
        assert_eq!(ts.times(), cube.times());
        let pixel = ts.pixel(1, 1).to_vec();
        assert_relative_eq!(pixel[0], 0.4 / 0.6, epsilon = 1e-12);
        assert_relative_eq!(pixel[1], 0.4 / 0.8, epsilon = 1e-12);
        assert!(pixel[2].is_nan());
    }

    #[test]
    fn test_compute_index_missing_band() {
        let mut cube = RasterCube::new();
        cube.insert("nir", make_series(&[0.5])).unwrap();
        assert!(matches!(
            compute_index(&cube, SpectralIndex::EVI),
            Err(Error::UnknownBand(_))
        ));
    }

    #[test]
    fn test_parse_index_name() {
        assert_eq!("ndvi".parse::<SpectralIndex>().unwrap(), SpectralIndex::NDVI);
        assert!("nbr".parse::<SpectralIndex>().is_err());
    }
}
