//! Supervised land-cover classification
//!
//! - **LabelEncoder**: raw labels to dense class codes
//! - **Split**: seeded 60/20/20 train/validation/test partitioning
//! - **StandardScaler**, **DecisionTree**, **RandomForest** and their pipeline
//! - **Grid search**: stratified k-fold cross-validated hyperparameter selection
//! - **Metrics**: accuracy, confusion matrix, per-class report
//! - **Persistence**: JSON model files

mod forest;
mod grid_search;
mod label_encoder;
mod metrics;
pub mod persist;
mod pipeline;
mod scaler;
mod split;
mod tree;

pub use forest::{ForestParams, RandomForest};
pub use grid_search::{
    grid_search, stratified_folds, train_random_forest, CvScore, GridSearchResult, HyperParams,
    ParamGrid,
};
pub use label_encoder::{map_labels, LabelEncoder};
pub use metrics::{accuracy, classification_report, confusion_matrix, ClassMetrics, ClassificationReport};
pub use persist::{load_model, save_model, DEFAULT_MODEL_DIR};
pub use pipeline::RandomForestPipeline;
pub use scaler::StandardScaler;
pub use split::{train_test_split, train_val_test_split, DataSplit, Partition};
pub use tree::{Criterion, DecisionTree, TreeParams};
