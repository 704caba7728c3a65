//! Device discovery.
//!
//! Each `*.csv` file directly under the data directory is one device, named
//! by its file stem. The registry keeps no state between calls: every
//! listing and lookup rescans the directory.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::error::RegistryError;
use super::store::TelemetryStore;

const SOURCE_EXTENSION: &str = "csv";

/// A device available for selection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DeviceDescriptor {
    /// Stable identifier derived from the source file name.
    pub id: String,
    #[serde(skip)]
    pub path: PathBuf,
}

impl DeviceDescriptor {
    pub fn store(&self) -> TelemetryStore {
        TelemetryStore::open(&self.id, &self.path)
    }
}

/// Maps device ids to their telemetry stores under one data directory.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    root: PathBuf,
}

impl DeviceRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List devices, ordered lexicographically by id.
    ///
    /// A missing data directory means no device has reported yet and yields
    /// an empty list.
    ///
    /// # Errors
    /// Returns [`RegistryError::Io`] if the directory exists but cannot be read.
    pub fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, RegistryError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(root = %self.root.display(), "Data directory not found");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let mut devices = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                tracing::warn!(path = %path.display(), "Skipping source with non UTF-8 name");
                continue;
            };
            devices.push(DeviceDescriptor {
                id: id.to_string(),
                path,
            });
        }

        devices.sort();
        tracing::debug!(root = %self.root.display(), count = devices.len(), "Devices listed");
        Ok(devices)
    }

    /// Look up the store for `id` in the current listing.
    ///
    /// # Errors
    /// Returns [`RegistryError::UnknownDevice`] if no source named `id` exists.
    pub fn resolve(&self, id: &str) -> Result<TelemetryStore, RegistryError> {
        self.list_devices()?
            .into_iter()
            .find(|device| device.id == id)
            .map(|device| device.store())
            .ok_or_else(|| RegistryError::UnknownDevice(id.to_string()))
    }
}
