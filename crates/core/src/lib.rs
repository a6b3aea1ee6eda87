//! # lcfuse core
//!
//! Core types and I/O for the lcfuse land-cover pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced 2D grid
//! - `TimeSeries` / `RasterCube`: single-band and multi-band time stacks on a shared grid
//! - `GeoTransform` and `CRS` for georeferencing, plus WGS84/UTM reprojection
//! - Vector features with GeoJSON reading
//! - Native GeoTIFF reading and writing

pub mod crs;
pub mod cube;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use cube::{RasterCube, TimeSeries};
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::cube::{RasterCube, TimeSeries};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::vector::{AttributeValue, Feature, FeatureCollection};
}
