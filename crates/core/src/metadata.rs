//! Application metadata document stored next to the registry.

use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};

/// Product name written into a fresh metadata document.
pub const DEFAULT_NAME: &str = "GTANext ModLoader";
/// Author credit written into a fresh metadata document.
pub const DEFAULT_AUTHOR: &str = "GTANext contributors";

/// `{name, author}` document shown in the about panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    /// Product name.
    pub name: String,
    /// Author credit.
    pub author: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            author: DEFAULT_AUTHOR.to_string(),
        }
    }
}

impl AppMetadata {
    /// Load metadata from `path`, falling back to defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(RegistryError::io("read", path, err)),
        };
        serde_json::from_str(&contents).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Persist metadata to `path`, creating parent directories if needed.
    pub fn persist(&self, path: impl AsRef<Path>) -> RegistryResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| RegistryError::io("create directory", parent, err))?;
        }
        let serialized = serde_json::to_string_pretty(self).map_err(|source| {
            RegistryError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        fs::write(path, serialized).map_err(|err| RegistryError::io("write", path, err))
    }

    /// Write the default document if `path` is missing, then load it.
    pub fn ensure(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            Self::default().persist(path)?;
        }
        Self::load(path)
    }
}
