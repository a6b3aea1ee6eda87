//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2};

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a row-major grid with its
/// geotransform, CRS and no-data value.
///
/// # Example
///
/// ```ignore
/// use lcfuse_core::{GeoTransform, Raster};
///
/// let mut raster: Raster<f64> = Raster::new(100, 100);
/// raster.set_transform(GeoTransform::new(500_000.0, 1_800_000.0, 10.0, -10.0));
///
/// // Nearest cell to a map coordinate
/// let (row, col) = raster.nearest_cell(500_125.0, 1_799_950.0)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from existing data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Replace the data, keeping georeferencing. Shape must match.
    pub fn with_data(&self, data: Array2<T>) -> Result<Self> {
        if data.dim() != self.shape() {
            let (ar, ac) = data.dim();
            return Err(Error::SizeMismatch {
                er: self.rows(),
                ec: self.cols(),
                ar,
                ac,
            });
        }
        Ok(Self {
            data,
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: self.nodata,
        })
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    // Coordinates

    /// Convert pixel coordinates to geographic coordinates (cell center)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Convert geographic coordinates to fractional pixel coordinates
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.geo_to_pixel(x, y)
    }

    /// Cell-center x coordinate of every column
    pub fn x_coords(&self) -> Vec<f64> {
        (0..self.cols()).map(|c| self.transform.center_x(c)).collect()
    }

    /// Cell-center y coordinate of every row
    pub fn y_coords(&self) -> Vec<f64> {
        (0..self.rows()).map(|r| self.transform.center_y(r)).collect()
    }

    /// Column whose cell center is nearest to `x`.
    ///
    /// Fails with [`Error::OutsideGrid`] when `x` lies outside the raster extent.
    pub fn nearest_col(&self, x: f64) -> Result<usize> {
        let (col, _) = self.transform.geo_to_pixel(x, self.transform.origin_y);
        to_index(col, self.cols()).ok_or(Error::OutsideGrid { x, y: f64::NAN })
    }

    /// Row whose cell center is nearest to `y`.
    pub fn nearest_row(&self, y: f64) -> Result<usize> {
        let (_, row) = self.transform.geo_to_pixel(self.transform.origin_x, y);
        to_index(row, self.rows()).ok_or(Error::OutsideGrid { x: f64::NAN, y })
    }

    /// (row, col) of the cell nearest to a map coordinate.
    pub fn nearest_cell(&self, x: f64, y: f64) -> Result<(usize, usize)> {
        let (col, row) = self.transform.geo_to_pixel(x, y);
        match (to_index(row, self.rows()), to_index(col, self.cols())) {
            (Some(r), Some(c)) => Ok((r, c)),
            _ => Err(Error::OutsideGrid { x, y }),
        }
    }

    /// Value of the cell nearest to a map coordinate
    pub fn sample(&self, x: f64, y: f64) -> Result<T> {
        let (row, col) = self.nearest_cell(x, y)?;
        self.get(row, col)
    }

    // Value checks

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Calculate basic statistics (min, max, mean, count of valid cells)
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }
            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }
            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        RasterStatistics {
            min,
            max,
            mean: (count > 0).then(|| sum / count as f64),
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Fractional pixel position → index, `None` outside `[0, len)`.
pub(crate) fn to_index(pos: f64, len: usize) -> Option<usize> {
    if !pos.is_finite() || pos < 0.0 || pos >= len as f64 {
        return None;
    }
    Some(pos.floor() as usize)
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}
