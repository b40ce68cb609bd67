//! Read-only sample catalog.
//!
//! A catalog maps a dataset name to an ordered, 0-indexed sequence of sample
//! records. It is static for the lifetime of a service: annotation stores
//! address samples by position, so reordering a dataset file while a service
//! is running would silently re-point every stored reference.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::constants::catalog::DATASET_FILE_EXTENSION;
use crate::data::{SampleRecord, SampleRef};
use crate::errors::AnnotationError;
use crate::types::DatasetName;

/// Shared, immutable sample sequence of one dataset.
pub type Samples = Arc<[SampleRecord]>;

/// Lookup interface over datasets of samples.
pub trait Catalog: Send + Sync {
    /// Names of every dataset, sorted.
    fn dataset_names(&self) -> Vec<DatasetName>;

    /// All samples of `dataset`, or `DatasetNotFound`.
    fn get(&self, dataset: &str) -> Result<Samples, AnnotationError>;

    /// Resolve one sample, failing with `SampleOutOfRange` past the end.
    fn sample_at(&self, sample: &SampleRef) -> Result<SampleRecord, AnnotationError> {
        let samples = self.get(&sample.dataset)?;
        samples
            .get(sample.position)
            .cloned()
            .ok_or_else(|| AnnotationError::SampleOutOfRange {
                sample: sample.clone(),
                len: samples.len(),
            })
    }
}

/// Catalog held entirely in memory. Used by tests and embedders that load
/// datasets themselves.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    datasets: BTreeMap<DatasetName, Samples>,
}

impl InMemoryCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace `dataset`.
    pub fn with_dataset<I>(mut self, dataset: impl Into<DatasetName>, samples: I) -> Self
    where
        I: IntoIterator<Item = SampleRecord>,
    {
        self.datasets
            .insert(dataset.into(), samples.into_iter().collect());
        self
    }
}

impl Catalog for InMemoryCatalog {
    fn dataset_names(&self) -> Vec<DatasetName> {
        self.datasets.keys().cloned().collect()
    }

    fn get(&self, dataset: &str) -> Result<Samples, AnnotationError> {
        self.datasets
            .get(dataset)
            .cloned()
            .ok_or_else(|| AnnotationError::DatasetNotFound(dataset.to_string()))
    }
}

/// Catalog backed by `*.json` files directly under one directory.
///
/// The dataset name is the file stem. Each file holds a JSON array of sample
/// objects. Files are discovered once at open and parsed lazily on first use,
/// then cached.
pub struct DirectoryCatalog {
    root: PathBuf,
    files: BTreeMap<DatasetName, PathBuf>,
    loaded: RwLock<HashMap<DatasetName, Samples>>,
}

impl DirectoryCatalog {
    /// Discover datasets under `root`, creating the directory if it is missing.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, AnnotationError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let mut files = BTreeMap::new();
        for entry in WalkDir::new(&root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
        {
            let path = entry.path();
            if !is_dataset_file(path) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                warn!(path = %path.display(), "skipping dataset file with non-UTF-8 name");
                continue;
            };
            files.insert(stem.to_string(), path.to_path_buf());
        }
        info!(root = %root.display(), datasets = files.len(), "discovered datasets");
        Ok(Self {
            root,
            files,
            loaded: RwLock::new(HashMap::new()),
        })
    }

    /// Directory the datasets were discovered in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn load_file(dataset: &str, path: &Path) -> Result<Samples, AnnotationError> {
        let bytes = fs::read(path)?;
        let raw: Vec<Value> = serde_json::from_slice(&bytes).map_err(|err| {
            AnnotationError::StorageUnavailable(format!(
                "dataset '{dataset}' is not a JSON array: {err}"
            ))
        })?;
        let mut samples = Vec::with_capacity(raw.len());
        for (position, value) in raw.into_iter().enumerate() {
            match value {
                Value::Object(fields) => samples.push(SampleRecord(fields)),
                _ => {
                    return Err(AnnotationError::StorageUnavailable(format!(
                        "dataset '{dataset}' entry {position} is not an object"
                    )));
                }
            }
        }
        Ok(samples.into())
    }
}

impl Catalog for DirectoryCatalog {
    fn dataset_names(&self) -> Vec<DatasetName> {
        self.files.keys().cloned().collect()
    }

    fn get(&self, dataset: &str) -> Result<Samples, AnnotationError> {
        if let Some(samples) = self
            .loaded
            .read()
            .map_err(|_| AnnotationError::lock_poisoned("catalog"))?
            .get(dataset)
        {
            return Ok(Arc::clone(samples));
        }
        let path = self
            .files
            .get(dataset)
            .ok_or_else(|| AnnotationError::DatasetNotFound(dataset.to_string()))?;
        let samples = Self::load_file(dataset, path)?;
        let mut guard = self
            .loaded
            .write()
            .map_err(|_| AnnotationError::lock_poisoned("catalog"))?;
        let cached = guard
            .entry(dataset.to_string())
            .or_insert_with(|| Arc::clone(&samples));
        Ok(Arc::clone(cached))
    }
}

fn is_dataset_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(DATASET_FILE_EXTENSION))
        .unwrap_or(false)
}
