//! Clipping rasters to polygons
//!
//! A cell belongs to a polygon when its center lies inside it (holes
//! excluded). Cells outside become NaN.

use geo::{BoundingRect, Contains, Coord, Geometry, Polygon, Rect};
use ndarray::{s, Array2};

use lcfuse_core::crs::reproject_geometry;
use lcfuse_core::{Error, GeoTransform, Raster, Result, CRS};

/// Polygonal parts of a geometry
fn polygons(geom: &Geometry<f64>) -> Result<Vec<Polygon<f64>>> {
    match geom {
        Geometry::Polygon(p) => Ok(vec![p.clone()]),
        Geometry::MultiPolygon(mp) => Ok(mp.0.clone()),
        Geometry::Rect(r) => Ok(vec![r.to_polygon()]),
        Geometry::GeometryCollection(gc) => {
            let mut out = Vec::new();
            for g in gc.iter() {
                out.extend(polygons(g)?);
            }
            Ok(out)
        }
        _ => Err(Error::Vector("clip geometry must be polygonal".into())),
    }
}

/// Rasterize a polygonal geometry onto a grid: true where the cell center is inside.
pub fn polygon_mask(
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    geom: &Geometry<f64>,
) -> Result<Array2<bool>> {
    let parts: Vec<(Polygon<f64>, Rect<f64>)> = polygons(geom)?
        .into_iter()
        .filter_map(|p| p.bounding_rect().map(|r| (p, r)))
        .collect();

    let mut mask = Array2::from_elem((rows, cols), false);
    for row in 0..rows {
        let y = transform.center_y(row);
        for col in 0..cols {
            let x = transform.center_x(col);
            let c = Coord { x, y };
            mask[[row, col]] = parts.iter().any(|(poly, rect)| {
                x >= rect.min().x
                    && x <= rect.max().x
                    && y >= rect.min().y
                    && y <= rect.max().y
                    && poly.contains(&c)
            });
        }
    }
    Ok(mask)
}

/// Pixel window `(row0, row1, col0, col1)` covering a geometry's bounding box
fn bounding_window(raster: &Raster<f64>, geom: &Geometry<f64>) -> Option<(usize, usize, usize, usize)> {
    let rect = geom.bounding_rect()?;
    let (c0, r0) = raster.geo_to_pixel(rect.min().x, rect.max().y);
    let (c1, r1) = raster.geo_to_pixel(rect.max().x, rect.min().y);
    let clamp = |v: f64, len: usize| v.max(0.0).min(len as f64);

    let row0 = clamp(r0.min(r1).floor(), raster.rows()) as usize;
    let row1 = clamp(r0.max(r1).ceil(), raster.rows()) as usize;
    let col0 = clamp(c0.min(c1).floor(), raster.cols()) as usize;
    let col1 = clamp(c0.max(c1).ceil(), raster.cols()) as usize;
    (row0 < row1 && col0 < col1).then_some((row0, row1, col0, col1))
}

/// Set cells outside `geom` to NaN.
///
/// With `drop`, the result is cropped to the geometry's bounding window.
///
/// # Errors
/// `NoDataInBounds` when no cell center falls inside the geometry.
pub fn clip(raster: &Raster<f64>, geom: &Geometry<f64>, drop: bool) -> Result<Raster<f64>> {
    let (rows, cols) = raster.shape();
    let mask = polygon_mask(raster.transform(), rows, cols, geom)?;
    if !mask.iter().any(|&inside| inside) {
        return Err(Error::NoDataInBounds);
    }

    let mut data = raster.data().clone();
    ndarray::Zip::from(&mut data).and(&mask).for_each(|v, &inside| {
        if !inside || raster.is_nodata(*v) {
            *v = f64::NAN;
        }
    });

    let mut out = raster.with_data(data)?;
    out.set_nodata(Some(f64::NAN));
    if !drop {
        return Ok(out);
    }

    let (row0, row1, col0, col1) = bounding_window(raster, geom).ok_or(Error::NoDataInBounds)?;
    let mut cropped = Raster::from_array(out.data().slice(s![row0..row1, col0..col1]).to_owned());
    cropped.set_transform(raster.transform().window(col0, row0));
    cropped.set_crs(raster.crs().cloned());
    cropped.set_nodata(Some(f64::NAN));
    Ok(cropped)
}

/// Clip to a boundary outline given in `boundary_crs`, keeping the full grid,
/// then turn negative values into NaN.
///
/// Only the exterior ring of the first polygon is used. The boundary is
/// reprojected to the raster CRS when both are known and differ.
pub fn clip_to_boundary(
    raster: &Raster<f64>,
    boundary: &Geometry<f64>,
    boundary_crs: Option<&CRS>,
) -> Result<Raster<f64>> {
    let outline = polygons(boundary)?
        .into_iter()
        .next()
        .map(|p| Polygon::new(p.exterior().clone(), vec![]))
        .ok_or_else(|| Error::Vector("boundary has no polygon".into()))?;
    let mut outline = Geometry::Polygon(outline);

    if let (Some(from), Some(to)) = (boundary_crs, raster.crs()) {
        outline = reproject_geometry(&outline, from, to)?;
    }

    let mut out = clip(raster, &outline, false)?;
    out.data_mut().mapv_inplace(|v| if v < 0.0 { f64::NAN } else { v });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, LineString};

    /// 4x4 raster of 1 m cells, origin (0, 4), values row*4 + col
    fn grid() -> Raster<f64> {
        let mut r = Raster::from_array(Array2::from_shape_fn((4, 4), |(r, c)| (r * 4 + c) as f64));
        r.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        r.set_crs(Some(CRS::from_epsg(32648)));
        r
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0)
        ])
    }

    #[test]
    fn test_mask_uses_cell_centers() {
        let r = grid();
        let mask = polygon_mask(r.transform(), 4, 4, &square(0.0, 2.0, 2.0, 4.0)).unwrap();
        let inside: usize = mask.iter().filter(|&&b| b).count();
        assert_eq!(inside, 4);
        assert!(mask[[0, 0]] && mask[[1, 1]] && !mask[[2, 2]]);
    }

    #[test]
    fn test_mask_honours_holes() {
        let r = grid();
        let shell = LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]);
        let hole = LineString::from(vec![(1.0, 1.0), (3.0, 1.0), (3.0, 3.0), (1.0, 3.0), (1.0, 1.0)]);
        let donut = Geometry::Polygon(Polygon::new(shell, vec![hole]));
        let mask = polygon_mask(r.transform(), 4, 4, &donut).unwrap();
        assert_eq!(mask.iter().filter(|&&b| b).count(), 12);
        assert!(!mask[[1, 1]]);
    }

    #[test]
    fn test_clip_keep_and_drop() {
        let r = grid();
        let geom = square(1.0, 1.0, 3.0, 3.0);

        let kept = clip(&r, &geom, false).unwrap();
        assert_eq!(kept.shape(), (4, 4));
        assert!(kept.get(0, 0).unwrap().is_nan());
        assert_eq!(kept.get(1, 1).unwrap(), 5.0);

        let dropped = clip(&r, &geom, true).unwrap();
        assert_eq!(dropped.shape(), (2, 2));
        assert_eq!(dropped.get(0, 0).unwrap(), 5.0);
        assert_eq!(dropped.get(1, 1).unwrap(), 10.0);
        assert_eq!(dropped.transform().origin_x, 1.0);
        assert_eq!(dropped.transform().origin_y, 3.0);
    }

    #[test]
    fn test_no_overlap() {
        assert!(matches!(
            clip(&grid(), &square(10.0, 10.0, 12.0, 12.0), true),
            Err(Error::NoDataInBounds)
        ));
        let point = Geometry::Point(geo::Point::new(1.0, 1.0));
        assert!(clip(&grid(), &point, false).is_err());
    }

    #[test]
    fn test_clip_to_boundary_removes_negatives() {
        let mut r = grid();
        r.set(1, 1, -3.0).unwrap();
        let out = clip_to_boundary(&r, &square(0.0, 0.0, 4.0, 4.0), Some(&CRS::from_epsg(32648))).unwrap();
        assert!(out.get(1, 1).unwrap().is_nan());
        assert!(out.data().iter().all(|v| v.is_nan() || *v >= 0.0));
        assert_eq!(out.get(3, 3).unwrap(), 15.0);
    }

    #[test]
    fn test_clip_to_boundary_reprojects() {
        // UTM 48N raster around 105E, 10.5N; boundary given in lon/lat
        let mut r = Raster::filled(10, 10, 1.0);
        let (e, n) = lcfuse_core::crs::reproject_point(105.0, 10.5, &CRS::wgs84(), &CRS::utm(48, true))
            .unwrap();
        r.set_transform(GeoTransform::new(e - 50.0, n + 50.0, 10.0, -10.0));
        r.set_crs(Some(CRS::utm(48, true)));

        let boundary = square(104.9, 10.4, 105.1, 10.6);
        let out = clip_to_boundary(&r, &boundary, Some(&CRS::wgs84())).unwrap();
        assert!(out.data().iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_clip_to_boundary_from_vn2000_tm3() {
        // UTM 48N raster at Hue; boundary covering its top half, surveyed in TM-3 105°30'
        let utm = CRS::utm(48, true);
        let tm3 = CRS::from_epsg(9209);
        let (e, n) = lcfuse_core::crs::reproject_point(107.5786, 16.4698, &CRS::wgs84(), &utm).unwrap();
        let (e0, n0) = (e.floor(), n.floor());
        let mut r = Raster::filled(10, 10, 1.0);
        r.set_transform(GeoTransform::new(e0, n0 + 100.0, 10.0, -10.0));
        r.set_crs(Some(utm.clone()));

        let top_half = square(e0 + 1.0, n0 + 51.0, e0 + 99.0, n0 + 99.0);
        let boundary = reproject_geometry(&top_half, &utm, &tm3).unwrap();
        let out = clip_to_boundary(&r, &boundary, Some(&tm3)).unwrap();
        assert_eq!(out.shape(), (10, 10));
        for row in 0..10 {
            for col in 0..10 {
                let v = out.get(row, col).unwrap();
                assert_eq!(v.is_nan(), row >= 5, "row {} col {}", row, col);
            }
        }
    }
}
