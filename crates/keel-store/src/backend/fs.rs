// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The on-disk directory backend, grounded on
//! `encore/storage/filesystem_store.py`: one file per key pair
//! (`<key>.data`/`<key>.metadata`), a marker file validated on connect, and
//! glob-free linear-scan queries over the metadata files.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use keel_core::{Event, EventBus, StoreKeyEvent, StoreModificationKind};
use parking_lot::Mutex;

use crate::store::{Metadata, ReadableStore, Result, Store, StoreError, StoreInfo};
use crate::transaction::{DummyTransaction, TransactionContext};
use crate::value::Value;

pub const DEFAULT_MARKER_NAME: &str = ".FSStore";

/// Writes the marker file a [`FileSystemStore`] root needs before `connect`
/// will accept it, grounded on `filesystem_store.py::init_shared_store`.
pub fn init_store_root(root: impl AsRef<Path>, marker_name: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(root.as_ref())?;
    let mut marker = std::fs::File::create(root.as_ref().join(marker_name))?;
    marker.write_all(b"__version__ = 0\n")
}

pub struct FileSystemStore {
    bus: EventBus,
    name: String,
    root: PathBuf,
    marker_name: String,
    connected: Mutex<bool>,
}

impl FileSystemStore {
    pub fn new(bus: EventBus, name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            bus,
            name: name.into(),
            root: root.into(),
            marker_name: DEFAULT_MARKER_NAME.to_owned(),
            connected: Mutex::new(false),
        }
    }

    pub fn with_marker_name(mut self, marker_name: impl Into<String>) -> Self {
        self.marker_name = marker_name.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn data_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.data"))
    }

    pub(crate) fn metadata_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.metadata"))
    }

    fn require_connected(&self) -> Result<()> {
        if *self.connected.lock() {
            Ok(())
        } else {
            Err(StoreError::NotConnected)
        }
    }

    fn read_metadata(&self, key: &str) -> Result<Metadata> {
        let path = self.metadata_path(key);
        let raw = std::fs::read_to_string(&path).map_err(|_| StoreError::KeyMissing(key.to_owned()))?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        match value {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(StoreError::BackendFailure(format!(
                "{key}.metadata is not a JSON object"
            ))),
        }
    }

    pub(crate) fn write_key(&self, key: &str, data: &[u8], metadata: &Metadata) -> Result<()> {
        std::fs::write(self.data_path(key), data)?;
        std::fs::write(
            self.metadata_path(key),
            serde_json::to_vec(metadata)?,
        )?;
        Ok(())
    }

    pub(crate) fn remove_key(&self, key: &str) -> Result<()> {
        std::fs::remove_file(self.data_path(key))?;
        std::fs::remove_file(self.metadata_path(key))?;
        Ok(())
    }

    pub(crate) fn emit_modification(&self, key: &str, kind: StoreModificationKind) {
        self.bus.emit(Event::StoreModification(StoreKeyEvent {
            source: self.name.clone(),
            key: key.to_owned(),
            kind,
        }));
    }
}

impl ReadableStore for FileSystemStore {
    fn connect(&self) -> Result<()> {
        if !self.root.join(&self.marker_name).exists() {
            return Err(StoreError::InvalidStore(format!(
                "missing marker file {} under {}",
                self.marker_name,
                self.root.display()
            )));
        }
        *self.connected.lock() = true;
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        *self.connected.lock() = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    fn info(&self) -> StoreInfo {
        StoreInfo {
            readonly: false,
            authorizing: false,
        }
    }

    fn get(&self, key: &str) -> Result<Value> {
        self.require_connected()?;
        let metadata = self.read_metadata(key)?;
        Ok(Value::from_file(self.data_path(key), metadata, None)?)
    }

    fn query(&self, select: Option<&[String]>, match_: &Metadata) -> Result<Vec<(String, Metadata)>> {
        self.require_connected()?;
        let mut results = Vec::new();
        let entries = std::fs::read_dir(&self.root)?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("metadata") {
                continue;
            }
            let key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_owned();
            let metadata = self.read_metadata(&key)?;
            if match_.iter().all(|(k, v)| metadata.get(k) == Some(v)) {
                let mut metadata = metadata;
                if let Some(select) = select {
                    metadata.retain(|k, _| select.iter().any(|name| name == k));
                }
                results.push((key, metadata));
            }
        }
        Ok(results)
    }
}

impl Store for FileSystemStore {
    fn set(&self, key: &str, data: Vec<u8>, metadata: Metadata) -> Result<()> {
        self.require_connected()?;
        let kind = if self.data_path(key).exists() {
            StoreModificationKind::Update
        } else {
            StoreModificationKind::Set
        };
        self.write_key(key, &data, &metadata)?;
        self.emit_modification(key, kind);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.require_connected()?;
        if !self.data_path(key).exists() {
            return Err(StoreError::KeyMissing(key.to_owned()));
        }
        self.remove_key(key)?;
        self.emit_modification(key, StoreModificationKind::Delete);
        Ok(())
    }

    fn transaction(&self, _notes: &str) -> Box<dyn TransactionContext + '_> {
        DummyTransaction::begin(self.bus.clone(), self.name.clone())
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
