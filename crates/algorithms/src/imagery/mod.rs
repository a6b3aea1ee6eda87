//! Spectral indices for optical bands
//!
//! NDVI, NDWI, GNDVI, SAVI and EVI, on single rasters or over a cube's time axis.

mod indices;

pub use indices::{compute_index, index_layer, SpectralIndex};
