//! Pure-Rust reprojection between WGS84, UTM and VN-2000 (Snyder 1987, USGS formulas).
//!
//! Supported: EPSG:4326, EPSG 326xx/327xx (Sentinel-1/2 native grids),
//! EPSG:4756 and the VN-2000 / TM-3 projections used by Vietnamese
//! cadastral and land-use maps. Every pair goes through WGS84 geographic
//! coordinates; VN-2000 is moved onto WGS84 by a 7-parameter Helmert shift.
//! Any other pair must already be equivalent, otherwise reprojection fails
//! with [`Error::CrsMismatch`].

use geo::{Coord, Geometry, MapCoords};

use super::CRS;
use crate::error::{Error, Result};

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
const TM3_K0: f64 = 0.9999;

// ── VN-2000 → WGS84 (position vector, rotations in arc-seconds, scale in ppm) ─

const VN2000_TO_WGS84: Helmert = Helmert {
    tx: -191.904_414_29,
    ty: -39.303_182_79,
    tz: -111.450_328_35,
    rx: -0.009_288_36,
    ry: 0.019_754_79,
    rz: -0.004_273_72,
    ds: 0.252_906_278,
};

/// Transverse Mercator projection on the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransverseMercator {
    /// Central meridian (degrees)
    pub lon0: f64,
    /// Scale factor on the central meridian
    pub k0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl TransverseMercator {
    /// UTM zone projection
    pub fn utm(zone: u32, north: bool) -> Self {
        Self {
            lon0: (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0,
            k0: UTM_K0,
            false_easting: UTM_FALSE_EASTING,
            false_northing: if north { 0.0 } else { UTM_FALSE_NORTHING_SOUTH },
        }
    }

    /// VN-2000 / TM-3 projection (3° zones, k0 = 0.9999)
    pub fn vn2000_tm3(central_meridian: f64) -> Self {
        Self {
            lon0: central_meridian,
            k0: TM3_K0,
            false_easting: UTM_FALSE_EASTING,
            false_northing: 0.0,
        }
    }

    /// Projection for a CRS, if it is a supported UTM or TM-3 zone
    pub fn for_crs(crs: &CRS) -> Option<Self> {
        crs.utm_zone()
            .map(|(zone, north)| Self::utm(zone, north))
            .or_else(|| crs.vn2000_tm3_meridian().map(Self::vn2000_tm3))
    }

    /// (lon, lat) degrees → (easting, northing) metres. Snyder eqs. 8-9, 8-10.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let lat = lat_deg.to_radians();
        let lon = lon_deg.to_radians();
        let lon0 = self.lon0.to_radians();

        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let tan_lat = lat.tan();

        let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
        let t = tan_lat * tan_lat;
        let c = E_PRIME2 * cos_lat * cos_lat;
        let a = cos_lat * (lon - lon0);
        let m = meridional_arc(lat);

        let a2 = a * a;
        let a4 = a2 * a2;
        let a6 = a4 * a2;

        let easting = self.k0
            * n
            * (a + (1.0 - t + c) * a2 * a / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a / 120.0)
            + self.false_easting;

        let northing = self.k0
            * (m + n
                * tan_lat
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0))
            + self.false_northing;

        (easting, northing)
    }

    /// (easting, northing) metres → (lon, lat) degrees. Snyder eqs. 8-12 to 8-25.
    pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let e4 = E2 * E2;
        let e6 = e4 * E2;
        let sqrt_1_e2 = (1.0 - E2).sqrt();
        let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);

        let m = (northing - self.false_northing) / self.k0;
        let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let sin_phi1 = phi1.sin();
        let cos_phi1 = phi1.cos();
        let tan_phi1 = phi1.tan();

        let c1 = E_PRIME2 * cos_phi1 * cos_phi1;
        let t1 = tan_phi1 * tan_phi1;
        let denom = 1.0 - E2 * sin_phi1 * sin_phi1;
        let n1 = A / denom.sqrt();
        let r1 = A * (1.0 - E2) / denom.powf(1.5);
        let d = (easting - self.false_easting) / (n1 * self.k0);

        let d2 = d * d;
        let d4 = d2 * d2;
        let d6 = d4 * d2;

        let lat = phi1
            - (n1 * tan_phi1 / r1)
                * (d2 / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * E_PRIME2
                        - 3.0 * c1 * c1)
                        * d6
                        / 720.0);

        let lon = self.lon0.to_radians()
            + (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                    * d4
                    * d
                    / 120.0)
                / cos_phi1;

        (lon.to_degrees(), lat.to_degrees())
    }
}

/// Meridional arc from equator to latitude `lat` (radians). Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

/// Seven-parameter similarity transform between geocentric frames.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Helmert {
    tx: f64,
    ty: f64,
    tz: f64,
    rx: f64,
    ry: f64,
    rz: f64,
    ds: f64,
}

impl Helmert {
    fn apply(&self, (x, y, z): (f64, f64, f64)) -> (f64, f64, f64) {
        let sec = std::f64::consts::PI / (180.0 * 3600.0);
        let (rx, ry, rz) = (self.rx * sec, self.ry * sec, self.rz * sec);
        let m = 1.0 + self.ds * 1e-6;
        (
            self.tx + m * (x - rz * y + ry * z),
            self.ty + m * (rz * x + y - rx * z),
            self.tz + m * (-ry * x + rx * y + z),
        )
    }

    /// Reverse shift; exact to well below a millimetre for small rotations
    fn inverse(&self) -> Self {
        Self {
            tx: -self.tx,
            ty: -self.ty,
            tz: -self.tz,
            rx: -self.rx,
            ry: -self.ry,
            rz: -self.rz,
            ds: -self.ds,
        }
    }

    /// Shift a geodetic (lon, lat) in degrees, at zero ellipsoidal height
    fn shift(&self, lon: f64, lat: f64) -> (f64, f64) {
        to_geodetic(self.apply(to_geocentric(lon, lat)))
    }
}

fn to_geocentric(lon_deg: f64, lat_deg: f64) -> (f64, f64, f64) {
    let (lon, lat) = (lon_deg.to_radians(), lat_deg.to_radians());
    let n = A / (1.0 - E2 * lat.sin().powi(2)).sqrt();
    (n * lat.cos() * lon.cos(), n * lat.cos() * lon.sin(), n * (1.0 - E2) * lat.sin())
}

fn to_geodetic((x, y, z): (f64, f64, f64)) -> (f64, f64) {
    let p = x.hypot(y);
    let lon = y.atan2(x);
    let mut lat = z.atan2(p * (1.0 - E2));
    for _ in 0..6 {
        let n = A / (1.0 - E2 * lat.sin().powi(2)).sqrt();
        let h = p / lat.cos() - n;
        lat = z.atan2(p * (1.0 - E2 * n / (n + h)));
    }
    (lon.to_degrees(), lat.to_degrees())
}

/// A supported CRS: optional projection plus the datum it sits on.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Frame {
    projection: Option<TransverseMercator>,
    vn2000: bool,
}

impl Frame {
    fn of(crs: &CRS) -> Option<Self> {
        let projection = if crs.is_geographic() {
            None
        } else {
            Some(TransverseMercator::for_crs(crs)?)
        };
        Some(Self {
            projection,
            vn2000: crs.is_vn2000(),
        })
    }

    fn to_wgs84(&self, x: f64, y: f64) -> (f64, f64) {
        let (lon, lat) = match &self.projection {
            Some(tm) => tm.inverse(x, y),
            None => (x, y),
        };
        if self.vn2000 {
            VN2000_TO_WGS84.shift(lon, lat)
        } else {
            (lon, lat)
        }
    }

    fn project_wgs84(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (lon, lat) = if self.vn2000 {
            VN2000_TO_WGS84.inverse().shift(lon, lat)
        } else {
            (lon, lat)
        };
        match &self.projection {
            Some(tm) => tm.forward(lon, lat),
            None => (lon, lat),
        }
    }
}

/// How a point moves between two CRS.
enum Transform {
    Identity,
    Via(Frame, Frame),
}

impl Transform {
    fn resolve(from: &CRS, to: &CRS) -> Result<Self> {
        if from.is_equivalent(to) {
            return Ok(Transform::Identity);
        }
        match (Frame::of(from), Frame::of(to)) {
            (Some(a), Some(b)) => Ok(Transform::Via(a, b)),
            _ => Err(Error::CrsMismatch(from.identifier(), to.identifier())),
        }
    }

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Transform::Identity => (x, y),
            Transform::Via(from, to) => {
                let (lon, lat) = from.to_wgs84(x, y);
                to.project_wgs84(lon, lat)
            }
        }
    }
}

/// Reproject a single (x, y) coordinate. Geographic coordinates are (lon, lat).
pub fn reproject_point(x: f64, y: f64, from: &CRS, to: &CRS) -> Result<(f64, f64)> {
    Ok(Transform::resolve(from, to)?.apply(x, y))
}

/// Reproject every vertex of a geometry.
pub fn reproject_geometry(geom: &Geometry<f64>, from: &CRS, to: &CRS) -> Result<Geometry<f64>> {
    let transform = Transform::resolve(from, to)?;
    if matches!(transform, Transform::Identity) {
        return Ok(geom.clone());
    }
    Ok(geom.map_coords(|c| {
        let (x, y) = transform.apply(c.x, c.y);
        Coord { x, y }
    }))
}
