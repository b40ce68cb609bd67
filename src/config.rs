use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::DirectoryCatalog;
use crate::constants::catalog::DEFAULT_DATA_DIR;
use crate::constants::error_flags::DEFAULT_ERROR_CATEGORIES;
use crate::constants::persistence::DEFAULT_STORE_ROOT;
use crate::errors::AnnotationError;
use crate::persistence::JsonDirPersistence;
use crate::service::AnnotationService;
use crate::types::CategoryName;

/// Top-level annotator configuration.
#[derive(Clone, Debug)]
pub struct AnnotatorConfig {
    /// Directory scanned for `*.json` dataset files.
    pub data_dir: PathBuf,
    /// Root directory under which annotation units are persisted.
    pub store_root: PathBuf,
    /// Closed set of error categories, in display order.
    pub error_categories: Vec<CategoryName>,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            store_root: PathBuf::from(DEFAULT_STORE_ROOT),
            error_categories: DEFAULT_ERROR_CATEGORIES
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl AnnotatorConfig {
    /// Override the catalog directory.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Override the persistence root.
    pub fn with_store_root(mut self, store_root: impl Into<PathBuf>) -> Self {
        self.store_root = store_root.into();
        self
    }

    /// Replace the error category set.
    pub fn with_error_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CategoryName>,
    {
        self.error_categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Build a service backed by a directory catalog and JSON files on disk.
    pub fn open(&self) -> Result<AnnotationService, AnnotationError> {
        let catalog = DirectoryCatalog::open(&self.data_dir)?;
        let persistence = JsonDirPersistence::new(&self.store_root);
        AnnotationService::open(
            Arc::new(catalog),
            Arc::new(persistence),
            self.error_categories.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_the_four_standard_categories() {
        let config = AnnotatorConfig::default();
        assert_eq!(
            config.error_categories,
            vec!["Misalignment", "Wrong", "Single Frame Bias", "Others"]
        );
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn builders_override_fields() {
        let config = AnnotatorConfig::default()
            .with_data_dir("/tmp/catalog")
            .with_store_root("/tmp/store")
            .with_error_categories(["Blurry"]);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/catalog"));
        assert_eq!(config.store_root, PathBuf::from("/tmp/store"));
        assert_eq!(config.error_categories, vec!["Blurry".to_string()]);
    }
}
