//! Persistence ports for annotation stores.
//!
//! Ownership model:
//! - A `PersistencePort` loads and saves whole named units of bytes. It knows
//!   nothing about what a unit contains.
//! - Stores encode their collections as JSON and rewrite a unit wholesale on
//!   every mutation, holding their own lock across the read-modify-write.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::AnnotationError;

/// In-memory backend.
pub mod memory;
/// One-JSON-file-per-unit backend.
pub mod json_dir;

pub use json_dir::JsonDirPersistence;
pub use memory::MemoryPersistence;

/// Load/save access to named persisted units.
///
/// A unit that was never saved loads as `None`; stores treat that as an
/// empty collection.
pub trait PersistencePort: Send + Sync {
    /// Return the full payload of `unit`, if it exists.
    fn load(&self, unit: &str) -> Result<Option<Vec<u8>>, AnnotationError>;
    /// Replace the full payload of `unit`.
    fn save(&self, unit: &str, payload: &[u8]) -> Result<(), AnnotationError>;
    /// Replace several units, in order.
    ///
    /// The default writes one unit after another; a failure leaves earlier
    /// units written.
    fn save_all(&self, units: &[(&str, &[u8])]) -> Result<(), AnnotationError> {
        for (unit, payload) in units {
            self.save(unit, payload)?;
        }
        Ok(())
    }
}

/// Load and decode `unit`, falling back to `T::default()` when it is absent.
pub fn load_json<T>(port: &dyn PersistencePort, unit: &str) -> Result<T, AnnotationError>
where
    T: DeserializeOwned + Default,
{
    match port.load(unit)? {
        None => Ok(T::default()),
        Some(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(T::default()),
        Some(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
            AnnotationError::StorageUnavailable(format!("corrupt unit '{unit}': {err}"))
        }),
    }
}

/// Encode `value` as indented JSON.
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, AnnotationError> {
    Ok(serde_json::to_vec_pretty(value)?)
}
