use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::constants::repurpose::{REPURPOSED_INDEX_UNIT, REPURPOSED_ITEMS_UNIT};
use crate::data::{RepurposedFields, RepurposedItem, SampleRef};
use crate::errors::AnnotationError;
use crate::index::PositionIndex;
use crate::persistence::{PersistencePort, encode_json, load_json};
use crate::stores::{StoreLock, list_subset, resolve_rank, subset};
use crate::types::{Position, Rank};

/// Difference between a persisted repurposed index and the one derived from
/// the primary list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexRepair {
    /// Samples that had items but were missing from the index.
    pub added: Vec<SampleRef>,
    /// Samples listed in the index without any item.
    pub removed: Vec<SampleRef>,
}

impl IndexRepair {
    /// True when the persisted index already matched.
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Repurposed VQA items plus the derived "which samples have items" index.
///
/// The primary list (`repurpose_data/repurposed_vqa.json`) is authoritative.
/// The index (`repurpose_data/repurposed_indices.json`) is a materialized
/// view: a position is indexed iff at least one item exists for that sample.
/// Both units are written together through [`PersistencePort::save_all`], list
/// first. A crash between the two writes leaves a stale index that
/// [`RepurposeStore::rebuild_index`] repairs.
///
/// Items have no stored id. An item is addressed by its rank among the items of
/// its sample, recomputed on every call, so a rank obtained from one
/// `list_for` stays meaningful only until the next mutation of that sample.
pub struct RepurposeStore {
    port: Arc<dyn PersistencePort>,
    lock: StoreLock,
}

impl RepurposeStore {
    /// Repurposing store persisting through `port`.
    pub fn new(port: Arc<dyn PersistencePort>) -> Self {
        Self {
            port,
            lock: StoreLock::new("repurposed items"),
        }
    }

    /// Append a new item for `sample` and index its position.
    ///
    /// Fails with `DuplicateItem` when `sample` already has an item with the
    /// same question, options and answer. Returns the new item's rank.
    pub fn create(
        &self,
        sample: &SampleRef,
        video_url: impl Into<String>,
        fields: RepurposedFields,
    ) -> Result<Rank, AnnotationError> {
        let _guard = self.lock.write()?;
        let mut items = self.load_items()?;
        let mut rank = 0usize;
        for (_, item) in subset(&items, sample) {
            if item.fields == fields {
                return Err(AnnotationError::DuplicateItem(sample.clone()));
            }
            rank += 1;
        }
        items.push(RepurposedItem {
            sample: sample.clone(),
            video_url: video_url.into(),
            fields,
        });
        let mut index = self.load_index()?;
        let index_changed = index.insert(sample);
        self.persist(&items, index_changed.then_some(&index))?;
        debug!(%sample, rank, "created repurposed item");
        Ok(rank)
    }

    /// Items of `sample` in creation order; the vector index is the rank.
    pub fn list_for(&self, sample: &SampleRef) -> Result<Vec<RepurposedItem>, AnnotationError> {
        let _guard = self.lock.read()?;
        Ok(list_subset(&self.load_items()?, sample))
    }

    /// Overwrite the question, options and answer of the item at `rank`.
    ///
    /// The item keeps its sample, video URL and place in the primary list.
    /// Fails with `DuplicateItem` if another item of the same sample already
    /// carries `fields`.
    pub fn update_at(
        &self,
        sample: &SampleRef,
        rank: Rank,
        fields: RepurposedFields,
    ) -> Result<(), AnnotationError> {
        let _guard = self.lock.write()?;
        let mut items = self.load_items()?;
        let target = resolve_rank(&items, sample, rank)?;
        if subset(&items, sample).any(|(index, item)| index != target && item.fields == fields) {
            return Err(AnnotationError::DuplicateItem(sample.clone()));
        }
        if items[target].fields == fields {
            return Ok(());
        }
        items[target].fields = fields;
        self.persist(&items, None)?;
        debug!(%sample, rank, "updated repurposed item");
        Ok(())
    }

    /// Remove the item at `rank`, unindexing the sample if it was the last one.
    ///
    /// Items after `rank` move down by one; earlier ranks are unchanged.
    pub fn delete_at(
        &self,
        sample: &SampleRef,
        rank: Rank,
    ) -> Result<RepurposedItem, AnnotationError> {
        let _guard = self.lock.write()?;
        let mut items = self.load_items()?;
        let target = resolve_rank(&items, sample, rank)?;
        let removed = items.remove(target);
        let mut index = self.load_index()?;
        let still_has_items = subset(&items, sample).next().is_some();
        let index_changed = if still_has_items {
            index.insert(sample)
        } else {
            index.remove(sample)
        };
        self.persist(&items, index_changed.then_some(&index))?;
        debug!(%sample, rank, unindexed = !still_has_items, "deleted repurposed item");
        Ok(removed)
    }

    /// Whether `sample` has at least one item.
    pub fn has_any(&self, sample: &SampleRef) -> Result<bool, AnnotationError> {
        let _guard = self.lock.read()?;
        Ok(subset(&self.load_items()?, sample).next().is_some())
    }

    /// Indexed positions of `dataset`, ascending.
    pub fn indexed_positions(&self, dataset: &str) -> Result<Vec<Position>, AnnotationError> {
        Ok(self.index()?.positions(dataset))
    }

    /// The persisted index.
    pub fn index(&self) -> Result<PositionIndex, AnnotationError> {
        let _guard = self.lock.read()?;
        self.load_index()
    }

    /// Every item of every sample, in primary-list order.
    pub fn items(&self) -> Result<Vec<RepurposedItem>, AnnotationError> {
        let _guard = self.lock.read()?;
        self.load_items()
    }

    /// Whether the persisted index equals the one derived from the items.
    pub fn check_index(&self) -> Result<bool, AnnotationError> {
        let _guard = self.lock.read()?;
        let derived = derive_index(&self.load_items()?);
        Ok(derived == self.load_index()?)
    }

    /// Recompute the index from the primary list and persist it if it differed.
    pub fn rebuild_index(&self) -> Result<IndexRepair, AnnotationError> {
        let _guard = self.lock.write()?;
        let items = self.load_items()?;
        let persisted = self.load_index()?;
        let derived = derive_index(&items);
        let repair = IndexRepair {
            added: derived
                .refs()
                .filter(|sample| !persisted.contains(sample))
                .collect(),
            removed: persisted
                .refs()
                .filter(|sample| !derived.contains(sample))
                .collect(),
        };
        if !repair.is_clean() {
            self.port
                .save(REPURPOSED_INDEX_UNIT, &encode_json(&derived)?)?;
            warn!(
                added = repair.added.len(),
                removed = repair.removed.len(),
                "repaired repurposed index"
            );
        }
        Ok(repair)
    }

    fn load_items(&self) -> Result<Vec<RepurposedItem>, AnnotationError> {
        load_json(self.port.as_ref(), REPURPOSED_ITEMS_UNIT)
    }

    fn load_index(&self) -> Result<PositionIndex, AnnotationError> {
        let mut index: PositionIndex = load_json(self.port.as_ref(), REPURPOSED_INDEX_UNIT)?;
        index.prune();
        Ok(index)
    }

    fn persist(
        &self,
        items: &[RepurposedItem],
        index: Option<&PositionIndex>,
    ) -> Result<(), AnnotationError> {
        let items_payload = encode_json(items)?;
        match index {
            Some(index) => {
                let index_payload = encode_json(index)?;
                self.port.save_all(&[
                    (REPURPOSED_ITEMS_UNIT, items_payload.as_slice()),
                    (REPURPOSED_INDEX_UNIT, index_payload.as_slice()),
                ])
            }
            None => self.port.save(REPURPOSED_ITEMS_UNIT, &items_payload),
        }
    }
}

fn derive_index(items: &[RepurposedItem]) -> PositionIndex {
    PositionIndex::from_refs(items.iter().map(|item| &item.sample))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::persistence::MemoryPersistence;

    fn store() -> (Arc<MemoryPersistence>, RepurposeStore) {
        let port = Arc::new(MemoryPersistence::new());
        (port.clone(), RepurposeStore::new(port))
    }

    fn fields(question: &str) -> RepurposedFields {
        RepurposedFields::new(question, "A/B", "A")
    }

    fn assert_index_matches_items(store: &RepurposeStore, samples: &[SampleRef]) {
        let index = store.index().unwrap();
        for sample in samples {
            assert_eq!(
                index.contains(sample),
                !store.list_for(sample).unwrap().is_empty(),
                "index disagrees with items for {sample}"
            );
        }
        assert!(store.check_index().unwrap());
    }

    #[test]
    fn create_then_delete_round_trips_the_index() {
        let (_port, store) = store();
        let sample = SampleRef::new("d1", 3);
        store.create(&sample, "u", fields("Q?")).unwrap();
        assert_eq!(store.indexed_positions("d1").unwrap(), vec![3]);
        assert!(store.has_any(&sample).unwrap());

        let removed = store.delete_at(&sample, 0).unwrap();
        assert_eq!(removed.fields, fields("Q?"));
        assert!(store.indexed_positions("d1").unwrap().is_empty());
        assert!(!store.index().unwrap().has_dataset("d1"));
        assert!(!store.has_any(&sample).unwrap());
    }

    #[test]
    fn duplicate_content_is_rejected_per_sample() {
        let (_port, store) = store();
        let sample = SampleRef::new("d1", 0);
        store.create(&sample, "u", fields("Q?")).unwrap();
        let err = store.create(&sample, "u", fields("Q?")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateItem);

        let changed_answer = RepurposedFields::new("Q?", "A/B", "B");
        assert_eq!(store.create(&sample, "u", changed_answer).unwrap(), 1);
        store
            .create(&SampleRef::new("d1", 1), "u", fields("Q?"))
            .unwrap();
        assert_eq!(store.list_for(&sample).unwrap().len(), 2);
    }

    #[test]
    fn deleting_a_rank_shifts_only_later_ranks() {
        let (_port, store) = store();
        let sample = SampleRef::new("d1", 2);
        let other = SampleRef::new("d1", 5);
        for question in ["q0", "q1", "q2", "q3"] {
            store.create(&sample, "u", fields(question)).unwrap();
            store.create(&other, "u", fields(question)).unwrap();
        }
        store.delete_at(&sample, 1).unwrap();
        let questions: Vec<String> = store
            .list_for(&sample)
            .unwrap()
            .into_iter()
            .map(|item| item.fields.question)
            .collect();
        assert_eq!(questions, vec!["q0", "q2", "q3"]);
        assert_eq!(store.list_for(&other).unwrap().len(), 4);
    }

    #[test]
    fn update_rewrites_fields_in_place() {
        let (_port, store) = store();
        let sample = SampleRef::new("d1", 0);
        store.create(&sample, "u0", fields("q0")).unwrap();
        store
            .create(&SampleRef::new("d2", 0), "x", fields("other"))
            .unwrap();
        store.create(&sample, "u1", fields("q1")).unwrap();

        store.update_at(&sample, 1, fields("edited")).unwrap();
        let items = store.items().unwrap();
        assert_eq!(items[2].fields.question, "edited");
        assert_eq!(items[2].video_url, "u1");
        assert_eq!(items[2].sample, sample);

        let err = store.update_at(&sample, 2, fields("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
        let err = store.update_at(&sample, 0, fields("edited")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateItem);
        store.update_at(&sample, 1, fields("edited")).unwrap();
    }

    #[test]
    fn delete_out_of_range_changes_nothing() {
        let (port, store) = store();
        let sample = SampleRef::new("d1", 0);
        store.create(&sample, "u", fields("q")).unwrap();
        let before = port.load(REPURPOSED_ITEMS_UNIT).unwrap();
        let err = store.delete_at(&sample, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
        let err = store.delete_at(&SampleRef::new("d1", 9), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
        assert_eq!(port.load(REPURPOSED_ITEMS_UNIT).unwrap(), before);
    }

    #[test]
    fn index_invariant_holds_across_interleaved_mutations() {
        let (_port, store) = store();
        let a = SampleRef::new("d1", 1);
        let b = SampleRef::new("d1", 4);
        let c = SampleRef::new("d2", 1);
        let all = [a.clone(), b.clone(), c.clone()];

        store.create(&a, "u", fields("a0")).unwrap();
        assert_index_matches_items(&store, &all);
        store.create(&b, "u", fields("b0")).unwrap();
        store.create(&a, "u", fields("a1")).unwrap();
        store.create(&c, "u", fields("c0")).unwrap();
        assert_index_matches_items(&store, &all);
        store.delete_at(&a, 0).unwrap();
        assert_index_matches_items(&store, &all);
        store.delete_at(&b, 0).unwrap();
        assert_index_matches_items(&store, &all);
        assert_eq!(store.indexed_positions("d1").unwrap(), vec![1]);
        store.delete_at(&a, 0).unwrap();
        store.delete_at(&c, 0).unwrap();
        assert_index_matches_items(&store, &all);
        assert!(store.index().unwrap().is_empty());
    }

    #[test]
    fn rebuild_repairs_a_desynced_index() {
        let (port, store) = store();
        let kept = SampleRef::new("d1", 0);
        store.create(&kept, "u", fields("q")).unwrap();
        port.save(
            REPURPOSED_INDEX_UNIT,
            br#"{"d1": [7], "ghost": [1]}"#.as_slice(),
        )
        .unwrap();
        assert!(!store.check_index().unwrap());

        let repair = store.rebuild_index().unwrap();
        assert_eq!(repair.added, vec![kept.clone()]);
        assert_eq!(
            repair.removed,
            vec![SampleRef::new("d1", 7), SampleRef::new("ghost", 1)]
        );
        assert!(store.check_index().unwrap());
        assert!(store.rebuild_index().unwrap().is_clean());
    }

    #[test]
    fn concurrent_create_and_delete_keep_the_index_consistent() {
        let (_port, store) = store();
        let store = Arc::new(store);
        let handles: Vec<_> = (0..6)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let sample = SampleRef::new("d1", t);
                    for i in 0..10 {
                        store
                            .create(&sample, "u", fields(&format!("t{t}-{i}")))
                            .unwrap();
                    }
                    // Even threads drain their sample again.
                    if t % 2 == 0 {
                        for _ in 0..10 {
                            store.delete_at(&sample, 0).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.items().unwrap().len(), 30);
        assert_eq!(store.indexed_positions("d1").unwrap(), vec![1, 3, 5]);
        assert!(store.check_index().unwrap());
    }

    #[test]
    fn rebuild_on_empty_store_writes_nothing() {
        let (port, store) = store();
        assert!(store.rebuild_index().unwrap().is_clean());
        assert!(port.unit_names().unwrap().is_empty());
    }
}
