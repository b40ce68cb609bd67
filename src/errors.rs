use std::io;

use thiserror::Error;

use crate::data::SampleRef;
use crate::types::{CategoryName, DatasetName};

/// Error type for catalog lookups, annotation mutations, and persistence failures.
#[derive(Debug, Error)]
pub enum AnnotationError {
    /// Missing, blank or malformed input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Category outside the configured set.
    #[error("unknown error category '{0}'")]
    UnknownCategory(CategoryName),
    /// No dataset of that name in the catalog.
    #[error("dataset '{0}' not found")]
    DatasetNotFound(DatasetName),
    /// Position past the end of a known dataset.
    #[error("sample {sample} is out of range (dataset has {len} samples)")]
    SampleOutOfRange {
        /// The rejected reference.
        sample: SampleRef,
        /// Current length of the dataset.
        len: usize,
    },
    /// Rank past the end of one sample's items.
    #[error("rank {rank} is out of range for {sample} ({len} items)")]
    IndexOutOfRange {
        /// Sample whose items were addressed.
        sample: SampleRef,
        /// The rejected rank.
        rank: usize,
        /// Number of items the sample has.
        len: usize,
    },
    /// Content-identical repurposed item already exists for the sample.
    #[error("an identical repurposed item already exists for {0}")]
    DuplicateItem(SampleRef),
    /// Persistence, encoding or lock failure.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// Stable classification of [`AnnotationError`] values.
///
/// Presentation layers map each kind to one distinct response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing field, or an unknown category.
    InvalidArgument,
    /// Unknown dataset, or a position outside the catalog bounds.
    SampleNotFound,
    /// Rank beyond a filtered subset's length.
    IndexOutOfRange,
    /// Content-identical repurposed item already present.
    DuplicateItem,
    /// I/O, encoding, or lock failure.
    StorageUnavailable,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::SampleNotFound => "sample_not_found",
            ErrorKind::IndexOutOfRange => "index_out_of_range",
            ErrorKind::DuplicateItem => "duplicate_item",
            ErrorKind::StorageUnavailable => "storage_unavailable",
        }
    }
}

impl AnnotationError {
    /// Classify this error into one of the five stable kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnnotationError::InvalidArgument(_) | AnnotationError::UnknownCategory(_) => {
                ErrorKind::InvalidArgument
            }
            AnnotationError::DatasetNotFound(_) | AnnotationError::SampleOutOfRange { .. } => {
                ErrorKind::SampleNotFound
            }
            AnnotationError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            AnnotationError::DuplicateItem(_) => ErrorKind::DuplicateItem,
            AnnotationError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
        }
    }

    pub(crate) fn lock_poisoned(what: &str) -> Self {
        AnnotationError::StorageUnavailable(format!("{what} lock poisoned"))
    }
}

impl From<io::Error> for AnnotationError {
    fn from(err: io::Error) -> Self {
        AnnotationError::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for AnnotationError {
    fn from(err: serde_json::Error) -> Self {
        AnnotationError::StorageUnavailable(format!("encoding failure: {err}"))
    }
}
