//! Loading multispectral scenes into a [`RasterCube`]
//!
//! [`CubeSource`] is the data-cube boundary: given a product, a lon/lat box
//! and a date range, it returns every requested band on one common grid.
//! [`CatalogCube`] implements it over a local STAC-style item collection whose
//! assets are GeoTIFF files.
//!
//! Scenes are resampled by nearest neighbour onto a north-up grid in the
//! output CRS. Zero is the sensor's nodata value and becomes NaN. Spectral
//! bands are harmonised, then scaled from digital numbers to surface
//! reflectance; the quality band keeps its raw class codes. Scenes that share
//! a time step (local solar day, or acquisition date with [`GroupBy::None`])
//! are fused, the first valid value winning.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lcfuse_core::crs::reproject_point;
use lcfuse_core::io::read_geotiff;
use lcfuse_core::{Error, GeoTransform, Raster, RasterCube, Result, TimeSeries, CRS};

use crate::maybe_rayon::*;

/// Offset added to L2A reflectances from processing baseline 04.00 on
const HARMONIZE_OFFSET: f64 = 1000.0;

/// L2A digital numbers to surface reflectance
const REFLECTANCE_SCALE: f64 = 1e-4;

/// First acquisition date processed with baseline 04.00
fn baseline_04_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 25).unwrap_or(NaiveDate::MIN)
}

/// What to load: product, lon/lat extent and inclusive date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeQuery {
    pub product: String,
    /// Longitude range (degrees)
    pub x: (f64, f64),
    /// Latitude range (degrees)
    pub y: (f64, f64),
    pub time: (NaiveDate, NaiveDate),
}

impl CubeQuery {
    /// `(min_lon, min_lat, max_lon, max_lat)`
    pub fn bbox(&self) -> (f64, f64, f64, f64) {
        (
            self.x.0.min(self.x.1),
            self.y.0.min(self.y.1),
            self.x.0.max(self.x.1),
            self.y.0.max(self.y.1),
        )
    }
}

/// Temporal grouping of scenes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// One time step per local solar day
    #[default]
    SolarDay,
    /// One time step per UTC acquisition date
    None,
}

/// How to load: bands, target grid and scene handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadParams {
    pub measurements: Vec<String>,
    /// Target CRS; the most common native CRS of the scenes when `None`
    pub output_crs: Option<CRS>,
    /// `(y, x)` cell size in output CRS units, y negative for north-up
    pub resolution: (f64, f64),
    pub group_by: GroupBy,
    /// Processing block size hint `(y, x)`. Loading is eager, so this is only logged.
    pub chunks: Option<(usize, usize)>,
    /// Remove the baseline 04.00 reflectance offset
    pub harmonize: bool,
    /// Categorical band, loaded as raw codes (no offset, no scaling)
    pub quality_band: String,
}

impl Default for LoadParams {
    fn default() -> Self {
        Self {
            measurements: ["blue", "green", "red", "nir", "scl"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            output_crs: None,
            resolution: (-10.0, 10.0),
            group_by: GroupBy::SolarDay,
            chunks: Some((2048, 2048)),
            harmonize: true,
            quality_band: "scl".into(),
        }
    }
}

/// The data-cube boundary
pub trait CubeSource {
    fn load(&self, query: &CubeQuery, params: &LoadParams) -> Result<RasterCube>;
}

/// One band file of a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemProperties {
    /// RFC 3339 acquisition time, or a plain `YYYY-MM-DD` date
    pub datetime: String,
    #[serde(rename = "proj:epsg", default)]
    pub epsg: Option<u32>,
    #[serde(rename = "s2:processing_baseline", default)]
    pub processing_baseline: Option<String>,
}

/// A scene in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    #[serde(default)]
    pub collection: String,
    /// `[min_lon, min_lat, max_lon, max_lat]`
    #[serde(default)]
    pub bbox: Option<[f64; 4]>,
    pub properties: ItemProperties,
    #[serde(default)]
    pub assets: BTreeMap<String, Asset>,
}

impl CatalogItem {
    /// Acquisition time in UTC
    pub fn acquired(&self) -> Result<NaiveDateTime> {
        let raw = self.properties.datetime.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.naive_utc());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
            .map_err(|e| Error::InvalidParameter {
                name: "datetime",
                value: raw.to_string(),
                reason: e.to_string(),
            })
    }

    /// Local solar date: UTC shifted by the scene's central longitude
    pub fn solar_day(&self) -> Result<NaiveDate> {
        let utc = self.acquired()?;
        let Some([min_lon, _, max_lon, _]) = self.bbox else {
            return Ok(utc.date());
        };
        let offset_secs = ((min_lon + max_lon) / 2.0 / 15.0 * 3600.0).round() as i64;
        let local = TimeDelta::try_seconds(offset_secs)
            .and_then(|d| utc.checked_add_signed(d))
            .unwrap_or(utc);
        Ok(local.date())
    }

    fn intersects(&self, bbox: (f64, f64, f64, f64)) -> bool {
        match self.bbox {
            Some([x0, y0, x1, y1]) => x0 <= bbox.2 && x1 >= bbox.0 && y0 <= bbox.3 && y1 >= bbox.1,
            None => true,
        }
    }

    /// Whether reflectances carry the +1000 offset of baseline 04.00
    pub fn needs_harmonization(&self) -> Result<bool> {
        let baseline = self
            .properties
            .processing_baseline
            .as_deref()
            .and_then(|b| b.trim().parse::<f64>().ok());
        Ok(match baseline {
            Some(b) => b >= 4.0,
            None => self.acquired()?.date() >= baseline_04_start(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ItemCollection {
    features: Vec<CatalogItem>,
}

/// Most frequent `proj:epsg` among `items`; ties go to the lowest code
pub fn most_common_crs(items: &[CatalogItem]) -> Result<CRS> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for code in items.iter().filter_map(|i| i.properties.epsg) {
        *counts.entry(code).or_default() += 1;
    }
    let mut best: Option<(u32, usize)> = None;
    for (&code, &n) in &counts {
        if best.map_or(true, |(_, m)| n > m) {
            best = Some((code, n));
        }
    }
    best.map(|(code, _)| CRS::from_epsg(code))
        .ok_or_else(|| Error::Algorithm("No scene declares a native CRS".into()))
}

/// Output grid of a load
#[derive(Debug, Clone)]
struct TargetGrid {
    transform: GeoTransform,
    rows: usize,
    cols: usize,
    crs: CRS,
}

impl TargetGrid {
    fn for_query(query: &CubeQuery, crs: CRS, resolution: (f64, f64)) -> Result<Self> {
        let (res_y, res_x) = resolution;
        if res_x <= 0.0 || (res_y.abs() - res_x).abs() > 1e-9 {
            return Err(Error::InvalidParameter {
                name: "resolution",
                value: format!("({}, {})", res_y, res_x),
                reason: "expected square cells as (-size, size)".into(),
            });
        }

        let (x0, y0, x1, y1) = query.bbox();
        let wgs84 = CRS::wgs84();
        let mut bounds = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (lon, lat) in [(x0, y0), (x0, y1), (x1, y0), (x1, y1)] {
            let (x, y) = reproject_point(lon, lat, &wgs84, &crs)?;
            bounds = (bounds.0.min(x), bounds.1.min(y), bounds.2.max(x), bounds.3.max(y));
        }
        let (transform, rows, cols) = GeoTransform::covering(bounds, res_x);
        Ok(Self {
            transform,
            rows,
            cols,
            crs,
        })
    }

    /// Nearest-neighbour resample of `source` onto this grid. Nodata, zero
    /// and cells outside the source become NaN.
    fn resample(&self, source: &Raster<f64>, source_crs: &CRS) -> Result<Array2<f64>> {
        let same_crs = source_crs.is_equivalent(&self.crs);
        let rows = (0..self.rows)
            .into_par_iter()
            .map(|row| {
                let y = self.transform.center_y(row);
                (0..self.cols)
                    .map(|col| {
                        let x = self.transform.center_x(col);
                        let (sx, sy) = if same_crs {
                            (x, y)
                        } else {
                            reproject_point(x, y, &self.crs, source_crs)?
                        };
                        Ok(match source.sample(sx, sy) {
                            Ok(v) if !source.is_nodata(v) && v != 0.0 => v,
                            _ => f64::NAN,
                        })
                    })
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let data: Vec<f64> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((self.rows, self.cols), data).map_err(|e| Error::Other(e.to_string()))
    }
}

/// A catalog of scenes described by a local item-collection JSON file.
///
/// Asset hrefs are resolved relative to the catalog's directory.
#[derive(Debug, Clone)]
pub struct CatalogCube {
    root: PathBuf,
    items: Vec<CatalogItem>,
}

impl CatalogCube {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let collection: ItemCollection = serde_json::from_str(&text)?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        tracing::debug!("catalog {} lists {} item(s)", path.display(), collection.features.len());
        Ok(Self {
            root,
            items: collection.features,
        })
    }

    pub fn from_items(root: impl Into<PathBuf>, items: Vec<CatalogItem>) -> Self {
        Self {
            root: root.into(),
            items,
        }
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    /// Items matching the query, ordered by acquisition time
    pub fn search(&self, query: &CubeQuery) -> Result<Vec<CatalogItem>> {
        let bbox = query.bbox();
        let mut found = Vec::new();
        for item in &self.items {
            if item.collection != query.product || !item.intersects(bbox) {
                continue;
            }
            let date = item.acquired()?.date();
            if date >= query.time.0 && date <= query.time.1 {
                found.push((item.acquired()?, item.clone()));
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        Ok(found.into_iter().map(|(_, item)| item).collect())
    }

    /// Resample one asset onto `grid`. With `reflectance_offset`, the offset is
    /// subtracted and the result scaled to reflectance.
    fn load_band(
        &self,
        item: &CatalogItem,
        band: &str,
        grid: &TargetGrid,
        reflectance_offset: Option<f64>,
    ) -> Result<Array2<f64>> {
        let asset = item.assets.get(band).ok_or_else(|| {
            Error::UnknownBand(format!("{} (scene {})", band, item.id))
        })?;
        let source: Raster<f64> = read_geotiff(self.root.join(&asset.href), None)?;
        let source_crs = source
            .crs()
            .cloned()
            .or_else(|| item.properties.epsg.map(CRS::from_epsg))
            .unwrap_or_else(|| grid.crs.clone());

        let mut data = grid.resample(&source, &source_crs)?;
        if let Some(offset) = reflectance_offset {
            data.mapv_inplace(|v| (v - offset) * REFLECTANCE_SCALE);
        }
        Ok(data)
    }

    /// All requested bands of one scene, in measurement order
    fn load_item(&self, item: &CatalogItem, params: &LoadParams, grid: &TargetGrid) -> Result<Vec<Array2<f64>>> {
        let harmonize = params.harmonize && item.needs_harmonization()?;
        params
            .measurements
            .iter()
            .map(|band| {
                let correction = if *band == params.quality_band {
                    None
                } else if harmonize {
                    Some(HARMONIZE_OFFSET)
                } else {
                    Some(0.0)
                };
                self.load_band(item, band, grid, correction)
            })
            .collect()
    }
}

/// Fill NaN cells of `into` from `from`
fn fuse_first_valid(into: &mut Array2<f64>, from: &Array2<f64>) {
    ndarray::Zip::from(into).and(from).for_each(|a, &b| {
        if a.is_nan() {
            *a = b;
        }
    });
}

impl CubeSource for CatalogCube {
    fn load(&self, query: &CubeQuery, params: &LoadParams) -> Result<RasterCube> {
        if params.measurements.is_empty() {
            return Err(Error::InvalidParameter {
                name: "measurements",
                value: "[]".into(),
                reason: "at least one band is required".into(),
            });
        }
        let items = self.search(query)?;
        if items.is_empty() {
            return Err(Error::Algorithm(format!(
                "No {} scenes between {} and {}",
                query.product, query.time.0, query.time.1
            )));
        }

        let crs = match &params.output_crs {
            Some(crs) => crs.clone(),
            None => {
                let crs = most_common_crs(&items)?;
                tracing::info!("most common native CRS: {}", crs);
                crs
            }
        };
        let grid = TargetGrid::for_query(query, crs, params.resolution)?;
        if let Some((cy, cx)) = params.chunks {
            tracing::debug!("chunk hint {}x{} ignored, loading eagerly", cy, cx);
        }
        tracing::info!(
            "loading {} scene(s), {} band(s) onto a {}x{} grid",
            items.len(),
            params.measurements.len(),
            grid.rows,
            grid.cols
        );

        let loaded = items
            .par_iter()
            .map(|item| self.load_item(item, params, &grid))
            .collect::<Result<Vec<_>>>()?;

        // (date, per-band layers), in time order
        let mut steps: Vec<(NaiveDate, Vec<Array2<f64>>)> = Vec::new();
        for (item, layers) in items.iter().zip(loaded) {
            let day = match params.group_by {
                GroupBy::SolarDay => item.solar_day()?,
                GroupBy::None => item.acquired()?.date(),
            };
            match steps.iter_mut().find(|(d, _)| *d == day) {
                Some((_, fused)) => {
                    for (into, from) in fused.iter_mut().zip(&layers) {
                        fuse_first_valid(into, from);
                    }
                }
                None => steps.push((day, layers)),
            }
        }
        steps.sort_by_key(|(d, _)| *d);

        let times: Vec<NaiveDate> = steps.iter().map(|(d, _)| *d).collect();
        let mut cube = RasterCube::new();
        for (b, band) in params.measurements.iter().enumerate() {
            let views: Vec<_> = steps.iter().map(|(_, layers)| layers[b].view()).collect();
            let data: Array3<f64> = ndarray::stack(Axis(0), &views).map_err(|e| Error::Other(e.to_string()))?;
            let series = TimeSeries::new(data, times.clone(), grid.transform, Some(grid.crs.clone()))?;
            cube.insert(band.clone(), series)?;
        }
        Ok(cube)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagery::{compute_index, SpectralIndex};
    use approx::assert_relative_eq;
    use lcfuse_core::io::write_geotiff;

    fn item(id: &str, datetime: &str, baseline: Option<&str>, epsg: Option<u32>) -> CatalogItem {
        CatalogItem {
            id: id.into(),
            collection: "s2_l2a".into(),
            bbox: Some([104.99, 10.49, 105.01, 10.51]),
            properties: ItemProperties {
                datetime: datetime.into(),
                epsg,
                processing_baseline: baseline.map(String::from),
            },
            assets: ["blue", "red", "scl"]
                .iter()
                .map(|b| (b.to_string(), Asset { href: format!("{}_{}.tif", id, b) }))
                .collect(),
        }
    }

    #[test]
    fn test_most_common_crs() {
        let items = vec![
            item("a", "2023-01-01", None, Some(32649)),
            item("b", "2023-01-02", None, Some(32648)),
            item("c", "2023-01-03", None, Some(32649)),
            item("d", "2023-01-04", None, None),
        ];
        assert_eq!(most_common_crs(&items).unwrap(), CRS::from_epsg(32649));
        // tie: lowest code
        assert_eq!(most_common_crs(&items[..2]).unwrap(), CRS::from_epsg(32648));
        assert!(most_common_crs(&items[3..]).is_err());
    }

    #[test]
    fn test_harmonization_rule() {
        assert!(item("a", "2021-06-01", Some("04.00"), None).needs_harmonization().unwrap());
        assert!(!item("a", "2023-06-01", Some("03.01"), None).needs_harmonization().unwrap());
        assert!(item("a", "2022-01-25T03:00:00Z", None, None).needs_harmonization().unwrap());
        assert!(!item("a", "2022-01-24T23:00:00Z", None, None).needs_harmonization().unwrap());
    }

    #[test]
    fn test_solar_day_shifts_by_longitude() {
        // 20:00 UTC at 105E is 03:00 the next local day
        let late = item("a", "2023-01-05T20:00:00Z", None, None);
        assert_eq!(late.solar_day().unwrap(), NaiveDate::from_ymd_opt(2023, 1, 6).unwrap());
        let morning = item("b", "2023-01-05T03:00:00Z", None, None);
        assert_eq!(morning.solar_day().unwrap(), NaiveDate::from_ymd_opt(2023, 1, 5).unwrap());
    }

    /// Writes constant-valued 2 km UTM 48N bands around (105E, 10.5N)
    fn write_bands(dir: &Path, id: &str, bands: &[(&str, f64)]) {
        let utm = CRS::utm(48, true);
        let (e, n) = reproject_point(105.0, 10.5, &CRS::wgs84(), &utm).unwrap();
        for &(band, value) in bands {
            let mut r = Raster::filled(200, 200, value);
            r.set_transform(GeoTransform::new(e - 1000.0, n + 1000.0, 10.0, -10.0));
            r.set_crs(Some(utm.clone()));
            write_geotiff(&r, dir.join(format!("{}_{}.tif", id, band)), None).unwrap();
        }
    }

    fn write_scene(dir: &Path, id: &str, [blue, red, scl]: [f64; 3]) {
        write_bands(dir, id, &[("blue", blue), ("red", red), ("scl", scl)]);
    }

    fn catalog(dir: &Path) -> CatalogCube {
        write_scene(dir, "s1", [0.0, 1500.0, 4.0]);
        write_scene(dir, "s2", [2200.0, 1700.0, 8.0]);
        write_scene(dir, "s3", [900.0, 900.0, 4.0]);
        let mut other = item("x", "2023-01-05T03:00:00Z", None, Some(32648));
        other.collection = "landsat".into();
        CatalogCube::from_items(
            dir,
            vec![
                item("s2", "2023-01-05T03:00:10Z", Some("05.09"), Some(32648)),
                item("s1", "2023-01-05T03:00:00Z", Some("05.09"), Some(32648)),
                item("s3", "2021-06-01T03:00:00Z", None, Some(32648)),
                other,
            ],
        )
    }

    fn query() -> CubeQuery {
        CubeQuery {
            product: "s2_l2a".into(),
            x: (104.999, 105.001),
            y: (10.499, 10.501),
            time: (
                NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
            ),
        }
    }

    fn params(group_by: GroupBy) -> LoadParams {
        LoadParams {
            measurements: vec!["blue".into(), "red".into(), "scl".into()],
            group_by,
            ..Default::default()
        }
    }

    #[test]
    fn test_load_fuses_solar_day_and_harmonizes() {
        let tmp = tempfile::tempdir().unwrap();
        let cube = catalog(tmp.path()).load(&query(), &params(GroupBy::SolarDay)).unwrap();

        assert_eq!(cube.band_names(), vec!["blue", "red", "scl"]);
        assert_eq!(
            cube.times(),
            &[
                NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(),
                NaiveDate::from_ymd_opt(2023, 1, 5).unwrap()
            ]
        );
        let (t, rows, cols) = cube.shape().unwrap();
        assert_eq!(t, 2);
        assert!(rows > 10 && cols > 10);

        let blue = cube.band("blue").unwrap().data();
        let red = cube.band("red").unwrap().data();
        let scl = cube.band("scl").unwrap().data();
        // 2021 scene predates baseline 04.00: scaled only
        assert_relative_eq!(red[[0, 0, 0]], 0.09, epsilon = 1e-12);
        // s1 is first on 2023-01-05; its zero blue is nodata, so s2 fills it
        assert_relative_eq!(red[[1, 3, 3]], 0.05, epsilon = 1e-12);
        assert_relative_eq!(blue[[1, 3, 3]], 0.12, epsilon = 1e-12);
        // quality band keeps raw codes
        assert_eq!(scl[[1, 3, 3]], 4.0);
        assert_eq!(cube.band("red").unwrap().crs(), Some(&CRS::utm(48, true)));
    }

    #[test]
    fn test_load_without_grouping_fuses_same_date() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        write_scene(dir, "s1", [0.0, 1500.0, 4.0]);
        write_scene(dir, "s2", [2200.0, 1700.0, 8.0]);
        // 20:00 UTC at 105E falls on the next solar day but the same UTC date
        let cube = CatalogCube::from_items(
            dir,
            vec![
                item("s1", "2023-01-05T03:00:00Z", Some("05.09"), Some(32648)),
                item("s2", "2023-01-05T20:00:00Z", Some("05.09"), Some(32648)),
            ],
        );

        let by_date = cube.load(&query(), &params(GroupBy::None)).unwrap();
        assert_eq!(by_date.times(), &[NaiveDate::from_ymd_opt(2023, 1, 5).unwrap()]);
        assert_relative_eq!(by_date.band("red").unwrap().data()[[0, 3, 3]], 0.05, epsilon = 1e-12);
        assert_relative_eq!(by_date.band("blue").unwrap().data()[[0, 3, 3]], 0.12, epsilon = 1e-12);

        let by_solar_day = cube.load(&query(), &params(GroupBy::SolarDay)).unwrap();
        assert_eq!(by_solar_day.times().len(), 2);
        assert!(by_solar_day.band("blue").unwrap().data()[[0, 3, 3]].is_nan());
    }

    #[test]
    fn test_load_without_harmonization_still_scales() {
        let tmp = tempfile::tempdir().unwrap();
        let mut p = params(GroupBy::SolarDay);
        p.harmonize = false;
        let cube = catalog(tmp.path()).load(&query(), &p).unwrap();
        assert_relative_eq!(cube.band("red").unwrap().data()[[1, 3, 3]], 0.15, epsilon = 1e-12);
        assert_eq!(cube.band("scl").unwrap().data()[[1, 3, 3]], 4.0);
    }

    #[test]
    fn test_evi_from_loaded_digital_numbers() {
        let tmp = tempfile::tempdir().unwrap();
        write_bands(tmp.path(), "dn", &[("nir", 5000.0), ("red", 1000.0), ("blue", 500.0)]);
        let mut scene = item("dn", "2021-06-01T03:00:00Z", None, Some(32648));
        scene.assets = ["nir", "red", "blue"]
            .iter()
            .map(|b| (b.to_string(), Asset { href: format!("dn_{}.tif", b) }))
            .collect();

        let mut p = params(GroupBy::SolarDay);
        p.measurements = vec!["nir".into(), "red".into(), "blue".into()];
        let cube = CatalogCube::from_items(tmp.path(), vec![scene]).load(&query(), &p).unwrap();

        let evi = compute_index(&cube, SpectralIndex::EVI).unwrap();
        let value = evi.pixel(3, 3)[0];
        // 2.5 * 0.4 / (0.5 + 0.6 - 0.375 + 1), not the 1.38 of raw counts
        assert_relative_eq!(value, 1.0 / 1.725, epsilon = 1e-9);
        assert!((value - 0.58).abs() < 0.005);
    }

    #[test]
    fn test_load_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let cube = catalog(tmp.path());

        let mut q = query();
        q.product = "unknown".into();
        assert!(cube.load(&q, &params(GroupBy::SolarDay)).is_err());

        let mut p = params(GroupBy::SolarDay);
        p.measurements.push("nir".into());
        assert!(matches!(cube.load(&query(), &p), Err(Error::UnknownBand(_))));

        let mut p = params(GroupBy::SolarDay);
        p.resolution = (-10.0, 20.0);
        assert!(cube.load(&query(), &p).is_err());
    }

    #[test]
    fn test_open_item_collection() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("catalog.json");
        fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": [{
                "id": "S2A_1", "collection": "s2_l2a", "bbox": [105.0, 10.0, 106.0, 11.0],
                "properties": {"datetime": "2023-03-01T03:21:00Z", "proj:epsg": 32648,
                               "s2:processing_baseline": "05.09"},
                "assets": {"red": {"href": "S2A_1/B04.tif"}}
            }]}"#,
        )
        .unwrap();
        let cube = CatalogCube::open(&path).unwrap();
        assert_eq!(cube.items().len(), 1);
        assert_eq!(cube.items()[0].properties.epsg, Some(32648));
        assert_eq!(cube.search(&query()).unwrap().len(), 1);
    }
}
