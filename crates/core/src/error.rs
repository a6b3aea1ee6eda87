//! Error types for lcfuse

use thiserror::Error;

/// Main error type for lcfuse operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Grid mismatch: {0}")]
    GridMismatch(String),

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Coordinate ({x}, {y}) is outside the grid bounds")]
    OutsideGrid { x: f64, y: f64 },

    #[error("Geometry does not overlap the raster")]
    NoDataInBounds,

    #[error("Unknown band: {0}")]
    UnknownBand(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Vector data error: {0}")]
    Vector(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::Vector(e.to_string())
    }
}

/// Result type alias for lcfuse operations
pub type Result<T> = std::result::Result<T, Error>;
