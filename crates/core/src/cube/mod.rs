//! Time-indexed raster stacks
//!
//! - [`TimeSeries`]: one band, `(time, row, col)`, NaN as the missing value
//! - [`RasterCube`]: named bands sharing one time axis and one grid

use chrono::NaiveDate;
use ndarray::{concatenate, Array3, ArrayView1, ArrayView2, Axis};

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{to_index, GeoTransform, Raster};

/// Tolerance (map units) when comparing grids of two stacks
const GRID_TOLERANCE: f64 = 1e-6;

/// A single-band raster time series on a fixed grid.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    /// Values indexed (time, row, col)
    data: Array3<f64>,
    times: Vec<NaiveDate>,
    transform: GeoTransform,
    crs: Option<CRS>,
}

impl TimeSeries {
    /// Create a time series. The time axis length must match `data`.
    pub fn new(
        data: Array3<f64>,
        times: Vec<NaiveDate>,
        transform: GeoTransform,
        crs: Option<CRS>,
    ) -> Result<Self> {
        if data.dim().0 != times.len() {
            return Err(Error::InvalidParameter {
                name: "times",
                value: times.len().to_string(),
                reason: format!("data has {} time steps", data.dim().0),
            });
        }
        Ok(Self {
            data,
            times,
            transform,
            crs,
        })
    }

    /// Stack dated rasters into a time series. All layers must share one grid;
    /// georeferencing is taken from the first layer.
    pub fn from_layers(layers: Vec<(NaiveDate, Raster<f64>)>) -> Result<Self> {
        let Some((_, first)) = layers.first() else {
            return Err(Error::Algorithm("Cannot build a time series from zero layers".into()));
        };
        let (rows, cols) = first.shape();
        let transform = *first.transform();
        let crs = first.crs().cloned();

        let mut views = Vec::with_capacity(layers.len());
        for (_, layer) in &layers {
            if layer.shape() != (rows, cols) {
                return Err(Error::SizeMismatch {
                    er: rows,
                    ec: cols,
                    ar: layer.rows(),
                    ac: layer.cols(),
                });
            }
            views.push(layer.view().insert_axis(Axis(0)));
        }

        let data = concatenate(Axis(0), &views).map_err(|e| Error::Other(e.to_string()))?;
        let times = layers.iter().map(|(t, _)| *t).collect();
        Self::new(data, times, transform, crs)
    }

    /// Number of time steps
    pub fn n_times(&self) -> usize {
        self.times.len()
    }

    /// (time, rows, cols)
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Spatial (rows, cols)
    pub fn grid_shape(&self) -> (usize, usize) {
        let (_, rows, cols) = self.data.dim();
        (rows, cols)
    }

    pub fn times(&self) -> &[NaiveDate] {
        &self.times
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<f64> {
        &mut self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Same grid, CRS and time axis with new values
    pub fn with_data(&self, data: Array3<f64>) -> Result<Self> {
        if data.dim() != self.data.dim() {
            let (_, er, ec) = self.data.dim();
            let (_, ar, ac) = data.dim();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(Self {
            data,
            times: self.times.clone(),
            transform: self.transform,
            crs: self.crs.clone(),
        })
    }

    /// Whether another stack sits on the same spatial grid
    pub fn same_grid(&self, other: &TimeSeries) -> bool {
        self.grid_shape() == other.grid_shape()
            && self.transform.approx_eq(&other.transform, GRID_TOLERANCE)
    }

    /// One time step as a raster
    pub fn layer(&self, t: usize) -> Result<Raster<f64>> {
        if t >= self.n_times() {
            return Err(Error::InvalidParameter {
                name: "time index",
                value: t.to_string(),
                reason: format!("series has {} time steps", self.n_times()),
            });
        }
        let mut raster = Raster::from_array(self.data.index_axis(Axis(0), t).to_owned());
        raster.set_transform(self.transform);
        raster.set_crs(self.crs.clone());
        raster.set_nodata(Some(f64::NAN));
        Ok(raster)
    }

    /// Values of one pixel across time
    pub fn pixel(&self, row: usize, col: usize) -> ArrayView1<'_, f64> {
        self.data.slice(ndarray::s![.., row, col])
    }

    /// All time steps of one grid row, shaped (time, cols)
    pub fn row_block(&self, row: usize) -> ArrayView2<'_, f64> {
        self.data.index_axis(Axis(1), row)
    }

    /// Cell-center x coordinate of every column
    pub fn x_coords(&self) -> Vec<f64> {
        (0..self.grid_shape().1).map(|c| self.transform.center_x(c)).collect()
    }

    /// Cell-center y coordinate of every row
    pub fn y_coords(&self) -> Vec<f64> {
        (0..self.grid_shape().0).map(|r| self.transform.center_y(r)).collect()
    }

    /// (row, col) of the cell nearest to a map coordinate
    pub fn nearest_cell(&self, x: f64, y: f64) -> Result<(usize, usize)> {
        let (rows, cols) = self.grid_shape();
        let (col, row) = self.transform.geo_to_pixel(x, y);
        match (to_index(row, rows), to_index(col, cols)) {
            (Some(r), Some(c)) => Ok((r, c)),
            _ => Err(Error::OutsideGrid { x, y }),
        }
    }

    /// Every time step at the cell nearest to `(x, y)`
    pub fn sample(&self, x: f64, y: f64) -> Result<Vec<f64>> {
        let (row, col) = self.nearest_cell(x, y)?;
        Ok(self.pixel(row, col).to_vec())
    }

    /// Sub-series at the given dates, in the order given.
    ///
    /// A date held by several time steps selects all of them, in series order.
    pub fn select_times(&self, dates: &[NaiveDate]) -> Result<TimeSeries> {
        let mut indices = Vec::with_capacity(dates.len());
        let mut times = Vec::with_capacity(dates.len());
        for date in dates {
            let before = indices.len();
            indices.extend(self.times.iter().enumerate().filter(|(_, t)| *t == date).map(|(i, _)| i));
            if indices.len() == before {
                return Err(Error::InvalidParameter {
                    name: "time",
                    value: date.to_string(),
                    reason: "date not present in series".into(),
                });
            }
            times.resize(indices.len(), *date);
        }
        Ok(Self {
            data: self.data.select(Axis(0), &indices),
            times,
            transform: self.transform,
            crs: self.crs.clone(),
        })
    }

    /// Concatenate series along time, in the order given. Grids must match.
    pub fn concat(parts: &[TimeSeries]) -> Result<TimeSeries> {
        let Some(first) = parts.first() else {
            return Err(Error::Algorithm("Cannot concatenate zero time series".into()));
        };
        for part in &parts[1..] {
            if !first.same_grid(part) {
                return Err(Error::GridMismatch(
                    "time series parts are on different grids".into(),
                ));
            }
        }
        let views: Vec<_> = parts.iter().map(|p| p.data.view()).collect();
        let data = concatenate(Axis(0), &views).map_err(|e| Error::Other(e.to_string()))?;
        let times = parts.iter().flat_map(|p| p.times.iter().copied()).collect();
        Self::new(data, times, first.transform, first.crs.clone())
    }

    /// Number of missing (NaN) values
    pub fn missing_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_nan()).count()
    }
}

/// Named bands on a shared time axis and grid.
#[derive(Debug, Clone, Default)]
pub struct RasterCube {
    bands: Vec<(String, TimeSeries)>,
}

impl RasterCube {
    pub fn new() -> Self {
        Self { bands: Vec::new() }
    }

    /// Add or replace a band. Every band must share the time axis and grid
    /// of the bands already present.
    pub fn insert(&mut self, name: impl Into<String>, series: TimeSeries) -> Result<()> {
        let name = name.into();
        if let Some((_, reference)) = self.bands.iter().find(|(n, _)| *n != name) {
            if reference.times != series.times {
                return Err(Error::GridMismatch(format!(
                    "band '{}' has a different time axis",
                    name
                )));
            }
            if !reference.same_grid(&series) {
                let (_, er, ec) = reference.shape();
                let (_, ar, ac) = series.shape();
                if (er, ec) != (ar, ac) {
                    return Err(Error::SizeMismatch { er, ec, ar, ac });
                }
                return Err(Error::GridMismatch(format!(
                    "band '{}' has a different geotransform",
                    name
                )));
            }
        }

        match self.bands.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = series,
            None => self.bands.push((name, series)),
        }
        Ok(())
    }

    /// Look up a band by name
    pub fn band(&self, name: &str) -> Result<&TimeSeries> {
        self.bands
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
            .ok_or_else(|| Error::UnknownBand(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bands.iter().any(|(n, _)| n == name)
    }

    /// Band names in insertion order
    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TimeSeries)> {
        self.bands.iter().map(|(n, s)| (n.as_str(), s))
    }

    /// Shared time axis (empty for an empty cube)
    pub fn times(&self) -> &[NaiveDate] {
        self.bands.first().map(|(_, s)| s.times()).unwrap_or(&[])
    }

    /// Shared (time, rows, cols)
    pub fn shape(&self) -> Option<(usize, usize, usize)> {
        self.bands.first().map(|(_, s)| s.shape())
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    fn layer(value: f64) -> Raster<f64> {
        let mut r = Raster::from_array(Array2::from_elem((2, 3), value));
        r.set_transform(GeoTransform::new(0.0, 20.0, 10.0, -10.0));
        r
    }

    fn series(values: &[f64], day0: u32) -> TimeSeries {
        let layers = values
            .iter()
            .enumerate()
            .map(|(i, v)| (date(day0 + i as u32), layer(*v)))
            .collect();
        TimeSeries::from_layers(layers).unwrap()
    }

    #[test]
    fn test_from_layers_shape() {
        let ts = series(&[1.0, 2.0, 3.0], 1);
        assert_eq!(ts.shape(), (3, 2, 3));
        assert_eq!(ts.pixel(1, 2).to_vec(), vec![1.0, 2.0, 3.0]);
        assert_eq!(ts.row_block(0).dim(), (3, 3));
    }

    #[test]
    fn test_sample_nearest() {
        let ts = series(&[1.0, 2.0], 1);
        assert_eq!(ts.sample(12.0, 3.0).unwrap(), vec![1.0, 2.0]);
        assert!(matches!(ts.sample(31.0, 3.0), Err(Error::OutsideGrid { .. })));
    }

    #[test]
    fn test_select_and_concat() {
        let ts = series(&[1.0, 2.0, 3.0, 4.0], 1);
        let a = ts.select_times(&[date(1), date(2)]).unwrap();
        let b = ts.select_times(&[date(3), date(4)]).unwrap();
        let joined = TimeSeries::concat(&[a, b]).unwrap();
        assert_eq!(joined.times(), ts.times());
        assert_eq!(joined.data(), ts.data());
        assert!(ts.select_times(&[date(9)]).is_err());
    }

    #[test]
    fn test_select_repeated_date_keeps_every_step() {
        let data = Array3::from_shape_vec((3, 1, 1), vec![1.0, 2.0, 3.0]).unwrap();
        let ts = TimeSeries::new(data, vec![date(1), date(1), date(2)], GeoTransform::default(), None).unwrap();
        let picked = ts.select_times(&[date(1)]).unwrap();
        assert_eq!(picked.times(), &[date(1), date(1)]);
        assert_eq!(picked.pixel(0, 0).to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_cube_rejects_mismatched_band() {
        let mut cube = RasterCube::new();
        cube.insert("red", series(&[1.0, 2.0], 1)).unwrap();
        cube.insert("nir", series(&[3.0, 4.0], 1)).unwrap();
        assert!(cube.insert("blue", series(&[1.0, 2.0], 5)).is_err());
        assert_eq!(cube.band_names(), vec!["red", "nir"]);
        assert!(matches!(cube.band("green"), Err(Error::UnknownBand(_))));
    }
}
