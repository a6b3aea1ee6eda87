//! Coordinate Reference System handling

mod reproject;

pub use reproject::{reproject_geometry, reproject_point, TransverseMercator};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const VN2000_GEOGRAPHIC: u32 = 4756;

/// VN-2000 / TM-3 projected CRS codes and their central meridians (degrees)
const VN2000_TM3: [(u32, f64); 18] = [
    (5896, 102.0),
    (5897, 105.0),
    (5898, 108.0),
    (5899, 111.0),
    (9205, 103.0),
    (9206, 104.0),
    (9207, 104.5),
    (9208, 104.75),
    (9209, 105.5),
    (9210, 105.75),
    (9211, 106.0),
    (9212, 106.25),
    (9213, 106.5),
    (9214, 107.0),
    (9215, 107.25),
    (9216, 107.5),
    (9217, 108.25),
    (9218, 108.5),
];

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// WGS84 / UTM zone CRS (EPSG:326xx north, 327xx south)
    pub fn utm(zone: u32, north: bool) -> Self {
        let base = if north { 32600 } else { 32700 };
        Self::from_epsg(base + zone)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// VN-2000 geographic CRS (EPSG:4756)
    pub fn vn2000() -> Self {
        Self::from_epsg(VN2000_GEOGRAPHIC)
    }

    /// Whether this is a geographic CRS in degrees (WGS84 or VN-2000)
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, Some(4326) | Some(VN2000_GEOGRAPHIC))
    }

    /// Whether coordinates are on the VN-2000 datum
    pub fn is_vn2000(&self) -> bool {
        self.epsg == Some(VN2000_GEOGRAPHIC) || self.vn2000_tm3_meridian().is_some()
    }

    /// Central meridian (degrees) of a VN-2000 / TM-3 projected CRS
    pub fn vn2000_tm3_meridian(&self) -> Option<f64> {
        let code = self.epsg?;
        VN2000_TM3
            .iter()
            .find(|(epsg, _)| *epsg == code)
            .map(|&(_, meridian)| meridian)
    }

    /// UTM zone and hemisphere, if this is a WGS84 / UTM CRS
    pub fn utm_zone(&self) -> Option<(u32, bool)> {
        match self.epsg? {
            code @ 32601..=32660 => Some((code - 32600, true)),
            code @ 32701..=32760 => Some((code - 32700, false)),
            _ => None,
        }
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        "Unknown".to_string()
    }
}

impl FromStr for CRS {
    type Err = Error;

    /// Parse `EPSG:<code>` (case-insensitive) or a bare EPSG number.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let code = trimmed
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("EPSG:"))
            .map(|_| &trimmed[5..])
            .unwrap_or(trimmed);

        code.parse::<u32>()
            .map(CRS::from_epsg)
            .map_err(|_| Error::InvalidParameter {
                name: "crs",
                value: s.to_string(),
                reason: "expected EPSG:<code>".into(),
            })
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_geographic());
    }

    #[test]
    fn test_crs_parse() {
        assert_eq!("EPSG:9209".parse::<CRS>().unwrap().epsg(), Some(9209));
        assert_eq!("epsg:32648".parse::<CRS>().unwrap().epsg(), Some(32648));
        assert_eq!("4326".parse::<CRS>().unwrap().epsg(), Some(4326));
        assert!("not-a-crs".parse::<CRS>().is_err());
    }

    #[test]
    fn test_utm_zone() {
        assert_eq!(CRS::from_epsg(32648).utm_zone(), Some((48, true)));
        assert_eq!(CRS::from_epsg(32721).utm_zone(), Some((21, false)));
        assert_eq!(CRS::from_epsg(32600).utm_zone(), None);
        assert_eq!(CRS::wgs84().utm_zone(), None);
        assert_eq!(CRS::utm(48, true).epsg(), Some(32648));
    }

    #[test]
    fn test_vn2000_family() {
        assert_eq!(CRS::from_epsg(9209).vn2000_tm3_meridian(), Some(105.5));
        assert_eq!(CRS::from_epsg(9214).vn2000_tm3_meridian(), Some(107.0));
        assert!(CRS::from_epsg(9209).is_vn2000());
        assert!(!CRS::from_epsg(9209).is_geographic());
        assert!(CRS::vn2000().is_geographic() && CRS::vn2000().is_vn2000());
        assert!(!CRS::utm(48, true).is_vn2000());
    }

    #[test]
    fn test_crs_equivalence() {
        let a = CRS::from_epsg(4326);
        let b = CRS::wgs84();
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&CRS::from_wkt("LOCAL_CS[]")));
    }
}
