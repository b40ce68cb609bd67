//! Annotation service: the catalog plus the four annotation stores.
//!
//! The service is the only place that consults the catalog. Every operation
//! that names a sample or a dataset rejects one outside the catalog with
//! `SampleNotFound`, except removals (unflag, unselect, delete by rank): those
//! only need the store, so stale references left behind by a shrunken dataset
//! can still be cleaned up.

use std::sync::Arc;

use tracing::info;

use crate::catalog::{Catalog, Samples};
use crate::data::{
    CaptionItem, DatasetInfo, ErrorSampleView, PositionedSample, RepurposedFields,
    RepurposedItem, RepurposedSampleView, SampleAnnotations, SampleRecord, SampleRef,
};
use crate::errors::AnnotationError;
use crate::persistence::PersistencePort;
use crate::stores::{
    CaptionStore, ErrorAnnotationStore, IndexRepair, RepurposeStore, SelectionStore,
};
use crate::types::{CategoryName, DatasetName, Position, Rank};

/// Orchestrates catalog lookups and annotation store mutations.
pub struct AnnotationService {
    catalog: Arc<dyn Catalog>,
    error_flags: ErrorAnnotationStore,
    repurpose: RepurposeStore,
    selection: SelectionStore,
    captions: CaptionStore,
}

impl AnnotationService {
    /// Build a service over `catalog`, persisting every store through `port`.
    ///
    /// Repairs the repurposed index against its primary list before returning.
    pub fn open(
        catalog: Arc<dyn Catalog>,
        port: Arc<dyn PersistencePort>,
        error_categories: Vec<CategoryName>,
    ) -> Result<Self, AnnotationError> {
        let service = Self {
            catalog,
            error_flags: ErrorAnnotationStore::new(Arc::clone(&port), error_categories)?,
            repurpose: RepurposeStore::new(Arc::clone(&port)),
            selection: SelectionStore::new(Arc::clone(&port)),
            captions: CaptionStore::new(port),
        };
        let repair = service.repurpose.rebuild_index()?;
        info!(
            datasets = service.catalog.dataset_names().len(),
            categories = service.error_flags.categories().len(),
            index_repaired = !repair.is_clean(),
            "annotation service ready"
        );
        Ok(service)
    }

    // ---- catalog ----

    /// The closed set of error categories, in declaration order.
    pub fn error_categories(&self) -> &[CategoryName] {
        self.error_flags.categories()
    }

    /// Names of every catalog dataset, sorted.
    pub fn datasets(&self) -> Vec<DatasetName> {
        self.catalog.dataset_names()
    }

    /// Sample count and every sample of `dataset`.
    pub fn dataset_info(&self, dataset: &str) -> Result<DatasetInfo, AnnotationError> {
        let samples = self.samples(dataset)?;
        Ok(DatasetInfo {
            name: dataset.to_string(),
            total_samples: samples.len(),
            samples: samples.iter().map(SampleRecord::normalized).collect(),
        })
    }

    /// One sample, with its video URL trimmed.
    pub fn sample(&self, sample: &SampleRef) -> Result<SampleRecord, AnnotationError> {
        Ok(self.resolve(sample)?.normalized())
    }

    // ---- error flags ----

    /// Flag or unflag `sample` under `category`. Returns whether state changed.
    pub fn set_error_flag(
        &self,
        category: &str,
        sample: &SampleRef,
        flagged: bool,
    ) -> Result<bool, AnnotationError> {
        require_text("dataset", &sample.dataset)?;
        if flagged {
            self.resolve(sample)?;
        }
        self.error_flags.set_flag(category, sample, flagged)
    }

    /// Remove `sample` from `category`.
    pub fn clear_error_flag(
        &self,
        category: &str,
        sample: &SampleRef,
    ) -> Result<bool, AnnotationError> {
        self.set_error_flag(category, sample, false)
    }

    /// Categories under which `sample` is flagged.
    pub fn error_categories_for(
        &self,
        sample: &SampleRef,
    ) -> Result<Vec<CategoryName>, AnnotationError> {
        self.resolve(sample)?;
        self.error_flags.list_categories(sample)
    }

    /// Raw flagged positions of a known dataset. Positions are not checked
    /// against the dataset's length.
    pub fn flagged_positions(
        &self,
        category: &str,
        dataset: &str,
    ) -> Result<Vec<Position>, AnnotationError> {
        self.samples(dataset)?;
        self.error_flags.list_flagged(category, dataset)
    }

    /// Flagged samples of `dataset` under `category`, joined with the catalog.
    ///
    /// Positions beyond the dataset's current length are skipped.
    pub fn error_samples(
        &self,
        dataset: &str,
        category: &str,
    ) -> Result<Vec<ErrorSampleView>, AnnotationError> {
        let samples = self.samples(dataset)?;
        let positions = self.error_flags.list_flagged(category, dataset)?;
        if positions.is_empty() {
            return Ok(Vec::new());
        }
        let repurposed = self.repurpose.index()?;
        Ok(positions
            .into_iter()
            .filter_map(|position| {
                let sample = samples.get(position)?;
                Some(ErrorSampleView {
                    position,
                    has_repurposed: repurposed.contains(&SampleRef::new(dataset, position)),
                    sample: sample.normalized(),
                })
            })
            .collect())
    }

    // ---- repurposed items ----

    /// Create a repurposed item, snapshotting the sample's video URL.
    pub fn add_repurposed(
        &self,
        sample: &SampleRef,
        fields: RepurposedFields,
    ) -> Result<Rank, AnnotationError> {
        require_fields(&fields)?;
        let source = self.resolve(sample)?;
        self.repurpose.create(sample, source.video_url(), fields)
    }

    /// Repurposed items of `sample` in creation order; the vector index is the rank.
    pub fn repurposed_for(
        &self,
        sample: &SampleRef,
    ) -> Result<Vec<RepurposedItem>, AnnotationError> {
        self.resolve(sample)?;
        self.repurpose.list_for(sample)
    }

    /// Replace the fields of the repurposed item at `rank`.
    pub fn update_repurposed(
        &self,
        sample: &SampleRef,
        rank: Rank,
        fields: RepurposedFields,
    ) -> Result<(), AnnotationError> {
        require_fields(&fields)?;
        self.resolve(sample)?;
        self.repurpose.update_at(sample, rank, fields)
    }

    /// Delete the repurposed item at `rank`. Later ranks move down by one.
    pub fn delete_repurposed(
        &self,
        sample: &SampleRef,
        rank: Rank,
    ) -> Result<RepurposedItem, AnnotationError> {
        self.repurpose.delete_at(sample, rank)
    }

    /// Whether `sample` has at least one repurposed item.
    pub fn has_repurposed(&self, sample: &SampleRef) -> Result<bool, AnnotationError> {
        self.resolve(sample)?;
        self.repurpose.has_any(sample)
    }

    /// Every sample of `dataset` that has repurposed items, with those items.
    ///
    /// Driven by the repurposed index; positions beyond the dataset's current
    /// length are skipped.
    pub fn repurposed_samples(
        &self,
        dataset: &str,
    ) -> Result<Vec<RepurposedSampleView>, AnnotationError> {
        let samples = self.samples(dataset)?;
        let positions = self.repurpose.indexed_positions(dataset)?;
        if positions.is_empty() {
            return Ok(Vec::new());
        }
        let items = self.repurpose.items()?;
        Ok(positions
            .into_iter()
            .filter_map(|position| {
                let sample = samples.get(position)?;
                let key = SampleRef::new(dataset, position);
                Some(RepurposedSampleView {
                    position,
                    sample: sample.normalized(),
                    items: items
                        .iter()
                        .filter(|item| item.sample == key)
                        .cloned()
                        .collect(),
                })
            })
            .collect())
    }

    /// Recompute the repurposed index from its primary list.
    pub fn rebuild_repurposed_index(&self) -> Result<IndexRepair, AnnotationError> {
        self.repurpose.rebuild_index()
    }

    // ---- selection ----

    /// Select or unselect `sample`. Returns whether state changed.
    pub fn set_selected(&self, sample: &SampleRef, selected: bool) -> Result<bool, AnnotationError> {
        require_text("dataset", &sample.dataset)?;
        let snapshot = if selected {
            Some(self.resolve(sample)?.snapshot())
        } else {
            None
        };
        self.selection.set_selected(sample, snapshot)
    }

    /// Whether `sample` is currently selected.
    pub fn is_selected(&self, sample: &SampleRef) -> Result<bool, AnnotationError> {
        self.resolve(sample)?;
        self.selection.is_selected(sample)
    }

    /// Selected samples of `dataset`, in selection order.
    pub fn selected_samples(&self, dataset: &str) -> Result<Vec<PositionedSample>, AnnotationError> {
        let samples = self.samples(dataset)?;
        let records = self.selection.list_dataset(dataset)?;
        Ok(records
            .into_iter()
            .filter_map(|record| {
                let position = record.sample.position;
                let sample = samples.get(position)?;
                Some(PositionedSample {
                    position,
                    sample: sample.normalized(),
                })
            })
            .collect())
    }

    // ---- captions ----

    /// Attach a caption to `sample`, snapshotting its video URL.
    pub fn add_caption(&self, sample: &SampleRef, caption: &str) -> Result<Rank, AnnotationError> {
        require_text("caption", caption)?;
        let source = self.resolve(sample)?;
        self.captions.add(sample, source.video_url(), caption)
    }

    /// Captions of `sample` in insertion order; the vector index is the rank.
    pub fn captions_for(&self, sample: &SampleRef) -> Result<Vec<CaptionItem>, AnnotationError> {
        self.resolve(sample)?;
        self.captions.list_for(sample)
    }

    /// Replace the text of the caption at `rank`.
    pub fn update_caption(
        &self,
        sample: &SampleRef,
        rank: Rank,
        caption: &str,
    ) -> Result<(), AnnotationError> {
        require_text("caption", caption)?;
        self.resolve(sample)?;
        self.captions.update_at(sample, rank, caption)
    }

    /// Delete the caption at `rank`. Later ranks move down by one.
    pub fn delete_caption(
        &self,
        sample: &SampleRef,
        rank: Rank,
    ) -> Result<CaptionItem, AnnotationError> {
        self.captions.delete_at(sample, rank)
    }

    // ---- aggregate ----

    /// Everything recorded against `sample`.
    pub fn sample_annotations(
        &self,
        sample: &SampleRef,
    ) -> Result<SampleAnnotations, AnnotationError> {
        self.resolve(sample)?;
        let repurposed = self.repurpose.list_for(sample)?;
        Ok(SampleAnnotations {
            sample: sample.clone(),
            error_categories: self.error_flags.list_categories(sample)?,
            has_repurposed: !repurposed.is_empty(),
            repurposed,
            is_selected: self.selection.is_selected(sample)?,
            captions: self.captions.list_for(sample)?,
        })
    }

    fn samples(&self, dataset: &str) -> Result<Samples, AnnotationError> {
        require_text("dataset", dataset)?;
        self.catalog.get(dataset)
    }

    fn resolve(&self, sample: &SampleRef) -> Result<SampleRecord, AnnotationError> {
        require_text("dataset", &sample.dataset)?;
        self.catalog.sample_at(sample)
    }
}

/// Parse a sample identifier of the form `<prefix>_<n>` or `<n>` into a position.
pub fn parse_sample_id(raw: &str) -> Result<Position, AnnotationError> {
    let trimmed = raw.trim();
    let digits = trimmed.rsplit('_').next().unwrap_or(trimmed);
    digits.parse::<Position>().map_err(|_| {
        AnnotationError::InvalidArgument(format!("invalid sample id '{raw}'"))
    })
}

fn require_text(field: &str, value: &str) -> Result<(), AnnotationError> {
    if value.trim().is_empty() {
        return Err(AnnotationError::InvalidArgument(format!(
            "missing required field '{field}'"
        )));
    }
    Ok(())
}

fn require_fields(fields: &RepurposedFields) -> Result<(), AnnotationError> {
    require_text("new_question", &fields.question)?;
    require_text("new_options", &fields.options)?;
    require_text("new_answer", &fields.answer)
}
