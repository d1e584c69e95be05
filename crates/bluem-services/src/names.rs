//! User-assigned device names.
//!
//! When constructed with a `persist_path`, names are written to disk on
//! every mutation and reloaded on startup, so they survive daemon restarts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use crate::peer::DeviceAddress;

#[derive(Clone, Default)]
pub struct CustomNames {
    names: Arc<DashMap<DeviceAddress, String>>,
    persist_path: Arc<Option<PathBuf>>,
}

impl CustomNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that persists to the given file path.
    /// Loads existing names from disk if the file exists.
    pub fn with_persistence(path: PathBuf) -> Self {
        let store = Self {
            names: Arc::new(DashMap::new()),
            persist_path: Arc::new(Some(path)),
        };
        store.load_from_disk();
        store
    }

    pub fn get(&self, address: &DeviceAddress) -> Option<String> {
        self.names.get(address).map(|n| n.value().clone())
    }

    /// Set a name. Blank names clear the entry. Returns the stored name.
    pub fn set(&self, address: &DeviceAddress, name: Option<&str>) -> Option<String> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        match name {
            Some(name) => {
                self.names.insert(address.clone(), name.to_string());
                tracing::info!(address = %address, name, "custom name set");
            }
            None => {
                self.names.remove(address);
                tracing::info!(address = %address, "custom name cleared");
            }
        }
        self.save_to_disk();
        name.map(str::to_string)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Serialize all names to disk as JSON. Best-effort, logs on failure.
    fn save_to_disk(&self) {
        let Some(path) = self.persist_path.as_ref() else {
            return;
        };
        let snapshot: HashMap<String, String> = self
            .names
            .iter()
            .map(|e| (e.key().to_string(), e.value().clone()))
            .collect();
        match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => {
                if let Some(parent) = path.parent() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        tracing::warn!(error = %e, path = %parent.display(), "failed to create names dir");
                    }
                }
                if let Err(e) = std::fs::write(path, json) {
                    tracing::warn!(error = %e, path = %path.display(), "failed to persist custom names");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize custom names"),
        }
    }

    /// Load names from disk. Called once during construction.
    fn load_from_disk(&self) {
        let Some(path) = self.persist_path.as_ref() else {
            return;
        };
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to read custom names");
                return;
            }
        };
        let map: HashMap<String, String> = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to parse custom names");
                return;
            }
        };
        for (address, name) in map {
            self.names.insert(DeviceAddress::from(address), name);
        }
        if !self.names.is_empty() {
            tracing::info!(count = self.names.len(), path = %path.display(), "loaded custom names");
        }
    }
}
