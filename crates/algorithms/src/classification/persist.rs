//! Saving and loading fitted models as JSON

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use lcfuse_core::Result;

/// Directory models are written to unless configured otherwise
pub const DEFAULT_MODEL_DIR: &str = "model_train";

/// Serialize `model` to `<dir>/<name>`, creating `dir` if needed.
///
/// An existing file of the same name is overwritten.
pub fn save_model<T: Serialize>(dir: impl AsRef<Path>, name: &str, model: &T) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    let writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer(writer, model)?;
    tracing::info!("model saved to {}", path.display());
    Ok(path)
}

pub fn load_model<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(serde_json::from_reader(reader)?)
}
