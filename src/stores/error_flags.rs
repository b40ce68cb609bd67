use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::constants::error_flags::ERROR_UNIT_DIR;
use crate::data::SampleRef;
use crate::errors::AnnotationError;
use crate::index::PositionIndex;
use crate::persistence::{PersistencePort, encode_json, load_json};
use crate::stores::StoreLock;
use crate::types::{CategoryName, Position};

/// Per-category flag sets over sample positions.
///
/// Each category is persisted as its own unit,
/// `error_annotation/<category>.json`, holding a [`PositionIndex`].
pub struct ErrorAnnotationStore {
    port: Arc<dyn PersistencePort>,
    categories: Vec<CategoryName>,
    lock: StoreLock,
}

impl ErrorAnnotationStore {
    /// Create a store over the closed category set `categories`.
    ///
    /// Category names must be non-empty, unique, and usable as file names.
    pub fn new(
        port: Arc<dyn PersistencePort>,
        categories: Vec<CategoryName>,
    ) -> Result<Self, AnnotationError> {
        let mut seen = HashSet::new();
        for category in &categories {
            if category.trim().is_empty() {
                return Err(AnnotationError::InvalidArgument(
                    "error category names must not be empty".into(),
                ));
            }
            if category.contains(['/', '\\']) || category.starts_with('.') {
                return Err(AnnotationError::InvalidArgument(format!(
                    "error category '{category}' cannot be used as a unit name"
                )));
            }
            if !seen.insert(category.as_str()) {
                return Err(AnnotationError::InvalidArgument(format!(
                    "error category '{category}' is declared twice"
                )));
            }
        }
        Ok(Self {
            port,
            categories,
            lock: StoreLock::new("error annotations"),
        })
    }

    /// Known categories in declaration order.
    pub fn categories(&self) -> &[CategoryName] {
        &self.categories
    }

    /// Flag (`true`) or unflag (`false`) `sample` under `category`.
    ///
    /// Returns whether the stored state changed; repeating a call is a no-op.
    pub fn set_flag(
        &self,
        category: &str,
        sample: &SampleRef,
        flagged: bool,
    ) -> Result<bool, AnnotationError> {
        self.check_category(category)?;
        let _guard = self.lock.write()?;
        let unit = unit_for(category);
        let mut flags = self.load_flags(&unit)?;
        let changed = if flagged {
            flags.insert(sample)
        } else {
            flags.remove(sample)
        };
        if changed {
            self.port.save(&unit, &encode_json(&flags)?)?;
            debug!(category, %sample, flagged, "updated error flag");
        }
        Ok(changed)
    }

    /// Remove `sample` from `category`. Same as `set_flag(.., false)`.
    pub fn clear_flag(&self, category: &str, sample: &SampleRef) -> Result<bool, AnnotationError> {
        self.set_flag(category, sample, false)
    }

    /// Categories under which `sample` is flagged, in declaration order.
    pub fn list_categories(&self, sample: &SampleRef) -> Result<Vec<CategoryName>, AnnotationError> {
        let _guard = self.lock.read()?;
        let mut hits = Vec::new();
        for category in &self.categories {
            if self.load_flags(&unit_for(category))?.contains(sample) {
                hits.push(category.clone());
            }
        }
        Ok(hits)
    }

    /// Flagged positions of `dataset` under `category`, ascending.
    ///
    /// Positions are not checked against the catalog.
    pub fn list_flagged(
        &self,
        category: &str,
        dataset: &str,
    ) -> Result<Vec<Position>, AnnotationError> {
        Ok(self.flags(category)?.positions(dataset))
    }

    /// The full dataset -> positions mapping of `category`.
    pub fn flags(&self, category: &str) -> Result<PositionIndex, AnnotationError> {
        self.check_category(category)?;
        let _guard = self.lock.read()?;
        self.load_flags(&unit_for(category))
    }

    fn check_category(&self, category: &str) -> Result<(), AnnotationError> {
        if self.categories.iter().any(|known| known == category) {
            Ok(())
        } else {
            Err(AnnotationError::UnknownCategory(category.to_string()))
        }
    }

    fn load_flags(&self, unit: &str) -> Result<PositionIndex, AnnotationError> {
        let mut flags: PositionIndex = load_json(self.port.as_ref(), unit)?;
        flags.prune();
        Ok(flags)
    }
}

fn unit_for(category: &str) -> String {
    format!("{ERROR_UNIT_DIR}/{category}.json")
}
