//! # lcfuse algorithms
//!
//! Land-cover classification from optical time series fused with radar.
//!
//! ## Pipeline stages
//!
//! - **acquisition**: load scenes from a catalog onto one grid
//! - **masking**: scene-classification quality masks
//! - **imagery**: spectral indices (NDVI, NDWI, GNDVI, SAVI, EVI)
//! - **gapfill** / **temporal**: split-wise gap filling and period means
//! - **features**: point sampling of index and radar bands
//! - **classification**: label encoding, splits, random forest, grid search
//! - **inference**: class prediction over the index grid
//! - **postprocess**: boundary clipping and per-polygon comparison
//! - **output**: merged per-category GeoTIFFs
//! - **workflow**: the stages above wired from a [`config::PipelineConfig`]

pub mod acquisition;
pub mod batch;
pub mod classification;
pub mod config;
pub mod features;
pub mod gapfill;
pub mod imagery;
pub mod inference;
pub mod masking;
pub(crate) mod maybe_rayon;
pub mod output;
pub mod postprocess;
pub mod temporal;
pub mod workflow;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::acquisition::{CatalogCube, CubeQuery, CubeSource, GroupBy, LoadParams};
    pub use crate::batch::{BatchOutcome, Skipped};
    pub use crate::classification::{
        grid_search, train_random_forest, train_val_test_split, GridSearchResult, LabelEncoder,
        ParamGrid,
    };
    pub use crate::config::{OutputDirs, PipelineConfig};
    pub use crate::features::{extract_point_features, FeatureSample, GroundPoint};
    pub use crate::gapfill::{fill_gaps, FillOrder};
    pub use crate::imagery::{compute_index, SpectralIndex};
    pub use crate::inference::predict_grid;
    pub use crate::masking::{apply_mask, enum_to_bool, mask_clean, QualityMask, SceneClass};
    pub use crate::output::{merge_rasters, write_results};
    pub use crate::postprocess::{clip, clip_to_boundary, compare, Category, CompareRules};
    pub use crate::temporal::{aggregate, Period};
    pub use crate::workflow::{TrainedModel, TrainingOutcome};
    pub use lcfuse_core::prelude::*;
}
