//! Dataset -> sorted position sets with empty-key pruning.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::data::SampleRef;
use crate::types::{DatasetName, Position};

/// Mapping from dataset name to a sorted set of sample positions.
///
/// A dataset key is present only while its set is non-empty. Persisted as a
/// JSON object of ascending integer arrays, e.g. `{"d1": [0, 3]}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionIndex {
    datasets: BTreeMap<DatasetName, BTreeSet<Position>>,
}

impl PositionIndex {
    /// Build an index containing every reference yielded by `refs`.
    pub fn from_refs<'a, I>(refs: I) -> Self
    where
        I: IntoIterator<Item = &'a SampleRef>,
    {
        let mut index = Self::default();
        for sample in refs {
            index.insert(sample);
        }
        index
    }

    /// Add `sample`'s position. Returns `true` when it was not present.
    pub fn insert(&mut self, sample: &SampleRef) -> bool {
        self.datasets
            .entry(sample.dataset.clone())
            .or_default()
            .insert(sample.position)
    }

    /// Remove `sample`'s position, dropping the dataset key once its set is
    /// empty. Returns `true` when the position was present.
    pub fn remove(&mut self, sample: &SampleRef) -> bool {
        let Some(positions) = self.datasets.get_mut(&sample.dataset) else {
            return false;
        };
        let removed = positions.remove(&sample.position);
        if positions.is_empty() {
            self.datasets.remove(&sample.dataset);
        }
        removed
    }

    /// Whether `sample` is indexed.
    pub fn contains(&self, sample: &SampleRef) -> bool {
        self.datasets
            .get(&sample.dataset)
            .is_some_and(|positions| positions.contains(&sample.position))
    }

    /// Positions recorded for `dataset`, ascending.
    pub fn positions(&self, dataset: &str) -> Vec<Position> {
        self.datasets
            .get(dataset)
            .map(|positions| positions.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `dataset` has at least one indexed position.
    pub fn has_dataset(&self, dataset: &str) -> bool {
        self.datasets.contains_key(dataset)
    }

    /// Dataset names with at least one position, sorted.
    pub fn datasets(&self) -> impl Iterator<Item = &DatasetName> {
        self.datasets.keys()
    }

    /// True when no dataset has any position.
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Every recorded reference, ordered by dataset then position.
    pub fn refs(&self) -> impl Iterator<Item = SampleRef> + '_ {
        self.datasets.iter().flat_map(|(dataset, positions)| {
            positions
                .iter()
                .map(move |position| SampleRef::new(dataset.clone(), *position))
        })
    }

    /// Drop dataset keys whose sets are empty (as older files may contain).
    pub fn prune(&mut self) {
        self.datasets.retain(|_, positions| !positions.is_empty());
    }
}
