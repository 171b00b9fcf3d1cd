use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::model::{ImageMetadata, RecognitionOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStatus {
    Present,
    Missing,
    Malformed,
}

/// A per-record document resolved from the result tree. Missing and malformed
/// documents carry `T::default()`.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub status: OutputStatus,
    pub value: T,
    pub problem: Option<String>,
}

impl<T: Default> Loaded<T> {
    pub fn present(value: T) -> Self {
        Self {
            status: OutputStatus::Present,
            value,
            problem: None,
        }
    }

    pub fn missing() -> Self {
        Self {
            status: OutputStatus::Missing,
            value: T::default(),
            problem: None,
        }
    }

    pub fn malformed(problem: String) -> Self {
        Self {
            status: OutputStatus::Malformed,
            value: T::default(),
            problem: Some(problem),
        }
    }
}

/// Lookup of precomputed per-record documents, keyed by record id.
pub trait OutputSource {
    fn recognition_output(
        &self,
        engine_dir: &str,
        record_id: &str,
    ) -> Result<Loaded<RecognitionOutput>>;

    fn image_metadata(&self, record_id: &str) -> Result<Loaded<ImageMetadata>>;
}

/// Result tree laid out as `<result_dir>/<engine_dir>/<dataset>/<id>.jpg.json`.
#[derive(Debug, Clone)]
pub struct FsOutputSource {
    result_dir: PathBuf,
    dataset: String,
    metadata_dir: String,
}

impl FsOutputSource {
    pub fn new(result_dir: &Path, dataset: &str, metadata_dir: &str) -> Self {
        Self {
            result_dir: result_dir.to_path_buf(),
            dataset: dataset.to_string(),
            metadata_dir: metadata_dir.to_string(),
        }
    }

    pub fn document_path(&self, dir: &str, record_id: &str) -> PathBuf {
        self.result_dir
            .join(dir)
            .join(&self.dataset)
            .join(format!("{record_id}.jpg.json"))
    }
}

impl OutputSource for FsOutputSource {
    fn recognition_output(
        &self,
        engine_dir: &str,
        record_id: &str,
    ) -> Result<Loaded<RecognitionOutput>> {
        read_document(&self.document_path(engine_dir, record_id))
    }

    fn image_metadata(&self, record_id: &str) -> Result<Loaded<ImageMetadata>> {
        read_document(&self.document_path(&self.metadata_dir, record_id))
    }
}

pub fn read_document<T: DeserializeOwned + Default>(path: &Path) -> Result<Loaded<T>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Loaded::missing()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    match serde_json::from_slice::<T>(&raw) {
        Ok(value) => Ok(Loaded::present(value)),
        Err(err) => Ok(Loaded::malformed(format!(
            "failed to parse {}: {err}",
            path.display()
        ))),
    }
}
