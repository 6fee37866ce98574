//! Blob persistence for inventory snapshots.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use crate::error::Result;

/// Load/save of one opaque JSON document.
pub trait StateBlobStore: std::fmt::Debug + Send + Sync {
    /// The stored document, or `None` if nothing has been saved yet.
    fn load(&self) -> Result<Option<Value>>;

    fn save(&self, state: &Value) -> Result<()>;
}

/// Pretty-printed JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateBlobStore for JsonFileStore {
    fn load(&self) -> Result<Option<Value>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn save(&self, state: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        // Write beside the target and rename so readers never see a torn file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blob: Mutex<Option<Value>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: Value) -> Self {
        Self {
            blob: Mutex::new(Some(state)),
        }
    }
}

impl StateBlobStore for MemoryBlobStore {
    fn load(&self) -> Result<Option<Value>> {
        Ok(self.blob.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, state: &Value) -> Result<()> {
        *self.blob.lock().unwrap_or_else(PoisonError::into_inner) = Some(state.clone());
        Ok(())
    }
}
