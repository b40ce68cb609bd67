//! Annotation stores.
//!
//! Every store owns a persistence port and one lock. Mutations hold the write
//! lock across load, modify and save so concurrent callers cannot lose each
//! other's updates; reads hold the read lock.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::data::{Anchored, SampleRef};
use crate::errors::AnnotationError;
use crate::types::Rank;

/// Caption store.
pub mod captions;
/// Error annotation store.
pub mod error_flags;
/// Repurposing store and its derived index.
pub mod repurpose;
/// Selection store.
pub mod selection;

pub use captions::CaptionStore;
pub use error_flags::ErrorAnnotationStore;
pub use repurpose::{IndexRepair, RepurposeStore};
pub use selection::SelectionStore;

/// Serialization lock owned by one store.
#[derive(Debug)]
pub(crate) struct StoreLock {
    name: &'static str,
    lock: RwLock<()>,
}

impl StoreLock {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            lock: RwLock::new(()),
        }
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, ()>, AnnotationError> {
        self.lock
            .read()
            .map_err(|_| AnnotationError::lock_poisoned(self.name))
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, ()>, AnnotationError> {
        self.lock
            .write()
            .map_err(|_| AnnotationError::lock_poisoned(self.name))
    }
}

/// Items anchored to `sample`, in primary-list order, with their list indices.
///
/// The enumeration order is the rank order: the n-th yielded item has rank n.
pub(crate) fn subset<'a, T: Anchored>(
    items: &'a [T],
    sample: &'a SampleRef,
) -> impl Iterator<Item = (usize, &'a T)> + 'a {
    items
        .iter()
        .enumerate()
        .filter(move |(_, item)| item.sample() == sample)
}

/// Clones of the items anchored to `sample`, in rank order.
pub(crate) fn list_subset<T: Anchored + Clone>(items: &[T], sample: &SampleRef) -> Vec<T> {
    subset(items, sample).map(|(_, item)| item.clone()).collect()
}

/// Map `rank` within `sample`'s subset to an index into the primary list.
pub(crate) fn resolve_rank<T: Anchored>(
    items: &[T],
    sample: &SampleRef,
    rank: Rank,
) -> Result<usize, AnnotationError> {
    let mut len = 0usize;
    for (index, _) in subset(items, sample) {
        if len == rank {
            return Ok(index);
        }
        len += 1;
    }
    Err(AnnotationError::IndexOutOfRange {
        sample: sample.clone(),
        rank,
        len,
    })
}
