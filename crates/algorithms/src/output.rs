//! Writing comparison results to GeoTIFF
//!
//! Each category's polygon clips are merged into a single raster and written
//! as `<dir>/<category key>.tif`.

use std::fs;
use std::path::{Path, PathBuf};

use lcfuse_core::io::write_geotiff;
use lcfuse_core::{Error, GeoTransform, Raster, Result};

use crate::batch::BatchOutcome;
use crate::postprocess::CategoryClips;

/// Cell counts are rounded with this slack so float noise on exact
/// multiples of the cell size does not add an extra row or column
const EXTENT_EPS: f64 = 1e-9;

/// Merge rasters onto the union of their extents.
///
/// The output uses the first raster's cell size, CRS and grid alignment of
/// the union corner. Cells no input covers are NaN. Where inputs overlap,
/// the first valid value wins.
pub fn merge_rasters(rasters: &[Raster<f64>]) -> Result<Raster<f64>> {
    let first = rasters
        .first()
        .ok_or_else(|| Error::Algorithm("Cannot merge an empty list of rasters".into()))?;

    let (mut min_x, mut min_y, mut max_x, mut max_y) = first.bounds();
    for r in &rasters[1..] {
        let (x0, y0, x1, y1) = r.bounds();
        min_x = min_x.min(x0);
        min_y = min_y.min(y0);
        max_x = max_x.max(x1);
        max_y = max_y.max(y1);
    }

    let pw = first.transform().pixel_width.abs();
    let ph = first.transform().pixel_height.abs();
    let cols = ((max_x - min_x) / pw - EXTENT_EPS).ceil().max(1.0) as usize;
    let rows = ((max_y - min_y) / ph - EXTENT_EPS).ceil().max(1.0) as usize;
    let transform = GeoTransform::new(min_x, max_y, pw, -ph);

    let mut merged = Raster::filled(rows, cols, f64::NAN);
    merged.set_transform(transform);
    merged.set_crs(first.crs().cloned());
    merged.set_nodata(Some(f64::NAN));

    for r in rasters {
        for ((row, col), &v) in r.data().indexed_iter() {
            if v.is_nan() || r.is_nodata(v) {
                continue;
            }
            let (x, y) = r.pixel_to_geo(col, row);
            let (fc, fr) = transform.geo_to_pixel(x, y);
            if fc < 0.0 || fr < 0.0 {
                continue;
            }
            let (oc, or) = (fc as usize, fr as usize);
            if or >= rows || oc >= cols {
                continue;
            }
            let cell = &mut merged.data_mut()[[or, oc]];
            if cell.is_nan() {
                *cell = v;
            }
        }
    }
    Ok(merged)
}

/// Write one merged GeoTIFF per category into `dir`, creating it if needed.
///
/// Categories without any clip are skipped with a warning. Returns the
/// written paths in category order.
pub fn write_results(outcome: &BatchOutcome<CategoryClips>, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for category in &outcome.items {
        if category.rasters.is_empty() {
            tracing::warn!("category {} has no clipped polygons, nothing written", category.key);
            continue;
        }
        let merged = merge_rasters(&category.rasters)?;
        let path = dir.join(format!("{}.tif", category.key));
        write_geotiff(&merged, &path, None)?;
        tracing::info!(
            "wrote {} ({} polygon(s), {}x{})",
            path.display(),
            category.rasters.len(),
            merged.rows(),
            merged.cols()
        );
        written.push(path);
    }
    Ok(written)
}
