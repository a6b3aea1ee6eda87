//! Post-processing of prediction rasters
//!
//! - **clip**: polygon masks, clipping, boundary clipping
//! - **compare**: per-polygon comparison against reference labels

mod clip;
mod compare;

pub use clip::{clip, clip_to_boundary, polygon_mask};
pub use compare::{compare, Category, CategoryClips, CompareRules, MaskRule};
