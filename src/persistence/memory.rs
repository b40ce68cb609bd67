use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::AnnotationError;
use crate::persistence::PersistencePort;
use crate::types::UnitName;

/// Volatile persistence backend. Units live only as long as the value.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    units: RwLock<HashMap<UnitName, Vec<u8>>>,
}

impl MemoryPersistence {
    /// Empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all units saved so far, sorted.
    pub fn unit_names(&self) -> Result<Vec<UnitName>, AnnotationError> {
        let guard = self
            .units
            .read()
            .map_err(|_| AnnotationError::lock_poisoned("memory persistence"))?;
        let mut names: Vec<UnitName> = guard.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl PersistencePort for MemoryPersistence {
    fn load(&self, unit: &str) -> Result<Option<Vec<u8>>, AnnotationError> {
        Ok(self
            .units
            .read()
            .map_err(|_| AnnotationError::lock_poisoned("memory persistence"))?
            .get(unit)
            .cloned())
    }

    fn save(&self, unit: &str, payload: &[u8]) -> Result<(), AnnotationError> {
        self.units
            .write()
            .map_err(|_| AnnotationError::lock_poisoned("memory persistence"))?
            .insert(unit.to_string(), payload.to_vec());
        Ok(())
    }

    fn save_all(&self, units: &[(&str, &[u8])]) -> Result<(), AnnotationError> {
        let mut guard = self
            .units
            .write()
            .map_err(|_| AnnotationError::lock_poisoned("memory persistence"))?;
        for (unit, payload) in units {
            guard.insert(unit.to_string(), payload.to_vec());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_units_load_back() {
        let port = MemoryPersistence::new();
        assert_eq!(port.load("a.json").unwrap(), None);
        port.save_all(&[("b.json", b"[]".as_slice()), ("a.json", b"{}".as_slice())])
            .unwrap();
        assert_eq!(port.load("a.json").unwrap(), Some(b"{}".to_vec()));
        assert_eq!(port.unit_names().unwrap(), vec!["a.json", "b.json"]);
    }
}
