#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Read-only dataset catalogs.
pub mod catalog;
/// Reusable command-line runners shared by downstream binaries.
pub mod cli_apps;
/// Annotator configuration.
pub mod config;
/// Centralized constants used across the catalog, stores, and persistence.
pub mod constants;
/// Sample references, records, and read views.
pub mod data;
/// Dataset -> positions index shared by error flags and repurposed samples.
pub mod index;
/// Persistence ports and backends.
pub mod persistence;
/// Annotation service orchestrating the catalog and stores.
pub mod service;
/// Annotation stores.
pub mod stores;
/// Shared type aliases.
pub mod types;

mod errors;

pub use catalog::{Catalog, DirectoryCatalog, InMemoryCatalog, Samples};
pub use config::AnnotatorConfig;
pub use data::{
    Anchored, CaptionItem, DatasetInfo, ErrorSampleView, PositionedSample, RepurposedFields,
    RepurposedItem, RepurposedSampleView, SampleAnnotations, SampleRecord, SampleRef,
    SampleSnapshot, SelectionRecord,
};
pub use errors::{AnnotationError, ErrorKind};
pub use index::PositionIndex;
pub use persistence::{JsonDirPersistence, MemoryPersistence, PersistencePort};
pub use service::{AnnotationService, parse_sample_id};
pub use stores::{
    CaptionStore, ErrorAnnotationStore, IndexRepair, RepurposeStore, SelectionStore,
};
pub use types::{CategoryName, DatasetName, Position, Rank, UnitName};
