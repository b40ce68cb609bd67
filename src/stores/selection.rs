use std::sync::Arc;

use tracing::debug;

use crate::constants::selection::SELECTED_UNIT;
use crate::data::{SampleRef, SampleSnapshot, SelectionRecord};
use crate::errors::AnnotationError;
use crate::persistence::{PersistencePort, encode_json, load_json};
use crate::stores::StoreLock;

/// Set of selected samples, keyed purely by [`SampleRef`].
///
/// A record's snapshot is taken when the sample is first selected and is never
/// refreshed while the selection stands.
pub struct SelectionStore {
    port: Arc<dyn PersistencePort>,
    lock: StoreLock,
}

impl SelectionStore {
    /// Selection store persisting through `port`.
    pub fn new(port: Arc<dyn PersistencePort>) -> Self {
        Self {
            port,
            lock: StoreLock::new("selection"),
        }
    }

    /// Select (`Some(snapshot)`) or unselect (`None`) `sample`.
    ///
    /// Selecting an already selected sample and unselecting an unselected one
    /// are no-ops. Returns whether the stored state changed.
    pub fn set_selected(
        &self,
        sample: &SampleRef,
        snapshot: Option<SampleSnapshot>,
    ) -> Result<bool, AnnotationError> {
        let _guard = self.lock.write()?;
        let mut records = self.load_records()?;
        let selected = snapshot.is_some();
        let changed = match snapshot {
            Some(snapshot) => {
                if records.iter().any(|record| &record.sample == sample) {
                    false
                } else {
                    records.push(SelectionRecord {
                        sample: sample.clone(),
                        snapshot,
                    });
                    true
                }
            }
            None => {
                let before = records.len();
                records.retain(|record| &record.sample != sample);
                records.len() != before
            }
        };
        if changed {
            self.port.save(SELECTED_UNIT, &encode_json(&records)?)?;
            debug!(%sample, selected, "updated selection");
        }
        Ok(changed)
    }

    /// Whether `sample` is selected.
    pub fn is_selected(&self, sample: &SampleRef) -> Result<bool, AnnotationError> {
        Ok(self.record_for(sample)?.is_some())
    }

    /// The selection record of `sample`, if selected.
    pub fn record_for(
        &self,
        sample: &SampleRef,
    ) -> Result<Option<SelectionRecord>, AnnotationError> {
        let _guard = self.lock.read()?;
        Ok(self
            .load_records()?
            .into_iter()
            .find(|record| &record.sample == sample))
    }

    /// Selection records of `dataset`, in selection order.
    pub fn list_dataset(&self, dataset: &str) -> Result<Vec<SelectionRecord>, AnnotationError> {
        let _guard = self.lock.read()?;
        Ok(self
            .load_records()?
            .into_iter()
            .filter(|record| record.sample.dataset == dataset)
            .collect())
    }

    fn load_records(&self) -> Result<Vec<SelectionRecord>, AnnotationError> {
        load_json(self.port.as_ref(), SELECTED_UNIT)
    }
}
