//! Pipeline configuration
//!
//! Everything a run needs beyond its input paths: mask codes, index choice,
//! temporal handling, label tables, category definitions, the search grid and
//! output directories. Loaded from JSON; every field has a default.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lcfuse_core::{Error, Result};

use crate::classification::{ParamGrid, DEFAULT_MODEL_DIR};
use crate::gapfill::FillOrder;
use crate::imagery::SpectralIndex;
use crate::masking::SceneClass;
use crate::postprocess::{Category, CompareRules};
use crate::temporal::Period;

/// Where models and comparison rasters are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputDirs {
    pub model_dir: PathBuf,
    pub result_dir: PathBuf,
}

impl Default for OutputDirs {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            result_dir: PathBuf::from("ThuanHoa/KetQua"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Scene-classification codes treated as clear observations
    pub good_quality_codes: Vec<u8>,
    pub quality_band: String,
    pub index: SpectralIndex,
    pub aggregation: Period,
    pub fill_order: FillOrder,
    /// Inclusive `[start, end]` date ranges for split-wise gap filling.
    /// Empty means the whole series is one split.
    pub time_splits: Vec<(NaiveDate, NaiveDate)>,
    /// Attribute holding the ground-truth label of training points
    pub label_field: String,
    /// Raw label to class name; empty keeps raw labels as they are
    pub label_mapping: BTreeMap<String, String>,
    /// Comparison categories, in output order
    pub categories: Vec<Category>,
    /// Reference polygon label to expected prediction code
    pub code_map: BTreeMap<String, f64>,
    /// Attribute holding the label of reference polygons
    pub reference_label_field: String,
    pub other_category: String,
    pub competing_category: String,
    pub extra_other_code: f64,
    pub seed: u64,
    pub cv_folds: usize,
    pub param_grid: ParamGrid,
    pub output: OutputDirs,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            good_quality_codes: SceneClass::DEFAULT_GOOD.to_vec(),
            quality_band: "scl".into(),
            index: SpectralIndex::NDVI,
            aggregation: Period::All,
            fill_order: FillOrder::default(),
            time_splits: Vec::new(),
            label_field: "Hientrang".into(),
            label_mapping: BTreeMap::new(),
            categories: Vec::new(),
            code_map: BTreeMap::new(),
            reference_label_field: "tenchu".into(),
            other_category: "TQ".into(),
            competing_category: "PNN".into(),
            extra_other_code: 3.0,
            seed: 42,
            cv_folds: 5,
            param_grid: ParamGrid::default(),
            output: OutputDirs::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(Error::InvalidParameter {
                name: "cv_folds",
                value: self.cv_folds.to_string(),
                reason: "need at least 2 folds".into(),
            });
        }
        if let Some((start, end)) = self.time_splits.iter().find(|(s, e)| s > e) {
            return Err(Error::InvalidParameter {
                name: "time_splits",
                value: format!("{} .. {}", start, end),
                reason: "range starts after it ends".into(),
            });
        }
        Ok(())
    }

    /// Split the time axis into the configured ranges.
    ///
    /// Dates outside every range are left out of the filled series; they are
    /// reported with a warning.
    pub fn splits_for(&self, times: &[NaiveDate]) -> Vec<Vec<NaiveDate>> {
        if self.time_splits.is_empty() {
            return Vec::new();
        }
        let uncovered = self.dates_outside_splits(times);
        if !uncovered.is_empty() {
            tracing::warn!(
                "{} time step(s) outside every time split are dropped: {:?}",
                uncovered.len(),
                uncovered
            );
        }
        crate::gapfill::split_by_ranges(times, &self.time_splits)
    }

    /// Dates that fall in no configured time split
    pub fn dates_outside_splits(&self, times: &[NaiveDate]) -> Vec<NaiveDate> {
        times
            .iter()
            .copied()
            .filter(|d| !self.time_splits.iter().any(|(start, end)| d >= start && d <= end))
            .collect()
    }

    /// Masking rules for the comparison, derived from the category table
    pub fn compare_rules(&self) -> Result<CompareRules> {
        CompareRules::from_categories(
            &self.categories,
            &self.other_category,
            &self.competing_category,
            self.extra_other_code,
        )
    }
}
