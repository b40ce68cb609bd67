use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::constants::persistence::TEMP_FILE_SUFFIX;
use crate::errors::AnnotationError;
use crate::persistence::PersistencePort;

/// File-backed persistence: each unit is one JSON file under `root`.
///
/// Unit `repurpose_data/repurposed_vqa.json` lives at
/// `<root>/repurpose_data/repurposed_vqa.json`. Files are replaced by writing a
/// sibling temp file and renaming it over the target, so a crash never leaves a
/// half-written unit behind.
pub struct JsonDirPersistence {
    root: PathBuf,
}

impl fmt::Debug for JsonDirPersistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonDirPersistence")
            .field("root", &self.root)
            .finish()
    }
}

impl JsonDirPersistence {
    /// Persist units under `root`. Directories are created on first save.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Directory every unit path is resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute-or-root-relative file path for `unit`.
    pub fn path_for(&self, unit: &str) -> Result<PathBuf, AnnotationError> {
        let relative = Path::new(unit);
        let escapes = relative
            .components()
            .any(|part| !matches!(part, Component::Normal(_)));
        if unit.is_empty() || escapes {
            return Err(AnnotationError::InvalidArgument(format!(
                "unit name '{unit}' must be a relative path without '..'"
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl PersistencePort for JsonDirPersistence {
    fn load(&self, unit: &str) -> Result<Option<Vec<u8>>, AnnotationError> {
        let path = self.path_for(unit)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AnnotationError::StorageUnavailable(format!(
                "failed to read {}: {err}",
                path.display()
            ))),
        }
    }

    fn save(&self, unit: &str, payload: &[u8]) -> Result<(), AnnotationError> {
        let path = self.path_for(unit)?;
        ensure_parent_dir(&path)?;
        let temp = temp_path(&path);
        fs::write(&temp, payload).map_err(|err| write_failure(&temp, err))?;
        fs::rename(&temp, &path).map_err(|err| write_failure(&path, err))?;
        debug!(unit, bytes = payload.len(), "saved unit");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(TEMP_FILE_SUFFIX);
    PathBuf::from(name)
}

fn ensure_parent_dir(path: &Path) -> Result<(), AnnotationError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn write_failure(path: &Path, err: io::Error) -> AnnotationError {
    AnnotationError::StorageUnavailable(format!("failed to write {}: {err}", path.display()))
}
