use std::sync::Arc;

use tracing::debug;

use crate::constants::selection::CAPTIONS_UNIT;
use crate::data::{CaptionItem, SampleRef};
use crate::errors::AnnotationError;
use crate::persistence::{PersistencePort, encode_json, load_json};
use crate::stores::{StoreLock, list_subset, resolve_rank, subset};
use crate::types::Rank;

/// Free-text captions, any number per sample.
///
/// Captions are addressed by rank within their sample, like repurposed items,
/// but identical captions are allowed.
pub struct CaptionStore {
    port: Arc<dyn PersistencePort>,
    lock: StoreLock,
}

impl CaptionStore {
    /// Caption store persisting through `port`.
    pub fn new(port: Arc<dyn PersistencePort>) -> Self {
        Self {
            port,
            lock: StoreLock::new("captions"),
        }
    }

    /// Append a caption and return its rank.
    pub fn add(
        &self,
        sample: &SampleRef,
        video_url: impl Into<String>,
        caption: impl Into<String>,
    ) -> Result<Rank, AnnotationError> {
        let _guard = self.lock.write()?;
        let mut items = self.load_items()?;
        let rank = subset(&items, sample).count();
        items.push(CaptionItem {
            sample: sample.clone(),
            video_url: video_url.into(),
            caption: caption.into(),
        });
        self.port.save(CAPTIONS_UNIT, &encode_json(&items)?)?;
        debug!(%sample, rank, "added caption");
        Ok(rank)
    }

    /// Captions of `sample` in insertion order; the vector index is the rank.
    pub fn list_for(&self, sample: &SampleRef) -> Result<Vec<CaptionItem>, AnnotationError> {
        let _guard = self.lock.read()?;
        Ok(list_subset(&self.load_items()?, sample))
    }

    /// Replace the text of the caption at `rank`.
    pub fn update_at(
        &self,
        sample: &SampleRef,
        rank: Rank,
        caption: impl Into<String>,
    ) -> Result<(), AnnotationError> {
        let _guard = self.lock.write()?;
        let mut items = self.load_items()?;
        let target = resolve_rank(&items, sample, rank)?;
        items[target].caption = caption.into();
        self.port.save(CAPTIONS_UNIT, &encode_json(&items)?)?;
        debug!(%sample, rank, "updated caption");
        Ok(())
    }

    /// Remove the caption at `rank`. Later ranks move down by one.
    pub fn delete_at(&self, sample: &SampleRef, rank: Rank) -> Result<CaptionItem, AnnotationError> {
        let _guard = self.lock.write()?;
        let mut items = self.load_items()?;
        let target = resolve_rank(&items, sample, rank)?;
        let removed = items.remove(target);
        self.port.save(CAPTIONS_UNIT, &encode_json(&items)?)?;
        debug!(%sample, rank, "deleted caption");
        Ok(removed)
    }

    fn load_items(&self) -> Result<Vec<CaptionItem>, AnnotationError> {
        load_json(self.port.as_ref(), CAPTIONS_UNIT)
    }
}
