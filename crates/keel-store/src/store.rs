// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Store trait family (spec.md §4.F), grounded on
//! `encore/storage/abstract_store.py`'s `AbstractReadOnlyStore`/
//! `AbstractStore`/`AbstractAuthorizingStore`: a uniform contract every
//! backend implements, with batch and streaming helpers built as default
//! methods over the small set of primitives each backend actually supplies.

use std::io::{Read, Write};

use keel_core::{EventBus, KeelError};
use thiserror::Error;

use crate::permissions::Permissions;
use crate::transaction::TransactionContext;
use crate::value::Value;

pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The error taxonomy for `keel-store`, collapsing onto spec.md §7's
/// cross-cutting cases.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    KeyMissing(String),

    #[error("store is not connected")]
    NotConnected,

    #[error("invalid store: {0}")]
    InvalidStore(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not the owner of this resource")]
    NotOwner,

    #[error("timed out")]
    TimedOut,

    #[error("backend failure: {0}")]
    BackendFailure(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for KeelError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::KeyMissing(key) => KeelError::KeyMissing(key),
            StoreError::NotConnected => KeelError::NotConnected,
            StoreError::InvalidStore(msg) => KeelError::InvalidStore(msg),
            StoreError::PermissionDenied(msg) => KeelError::PermissionDenied(msg),
            StoreError::NotOwner => KeelError::NotOwner,
            StoreError::TimedOut => KeelError::TimedOut,
            StoreError::BackendFailure(msg) => KeelError::BackendFailure(msg),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        if value.kind() == std::io::ErrorKind::NotFound {
            StoreError::BackendFailure(format!("not found: {value}"))
        } else {
            StoreError::BackendFailure(value.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::BackendFailure(value.to_string())
    }
}

impl From<keel_lock::FileLockError> for StoreError {
    fn from(value: keel_lock::FileLockError) -> Self {
        match value {
            keel_lock::FileLockError::AlreadyLocked => StoreError::TimedOut,
            keel_lock::FileLockError::NotOwner => StoreError::NotOwner,
            keel_lock::FileLockError::TimedOut => StoreError::TimedOut,
            keel_lock::FileLockError::Io(e) => StoreError::BackendFailure(e.to_string()),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        StoreError::BackendFailure(value.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(value: reqwest::Error) -> Self {
        match value.status() {
            Some(status) if status.as_u16() == 404 => {
                StoreError::KeyMissing(value.url().map(|u| u.to_string()).unwrap_or_default())
            }
            Some(status) if status.as_u16() == 403 => {
                StoreError::PermissionDenied(value.url().map(|u| u.to_string()).unwrap_or_default())
            }
            _ => StoreError::BackendFailure(value.to_string()),
        }
    }
}

/// Capability flags a store declares about itself, mirroring
/// `AbstractStore.info()`'s `readonly`/`authorizing` keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreInfo {
    pub readonly: bool,
    pub authorizing: bool,
}

/// The read-side contract every store implements, whether or not it also
/// supports mutation.
pub trait ReadableStore: Send + Sync {
    fn connect(&self) -> Result<()>;
    fn disconnect(&self) -> Result<()>;
    fn is_connected(&self) -> bool;
    fn info(&self) -> StoreInfo;

    fn get(&self, key: &str) -> Result<Value>;

    fn get_metadata(&self, key: &str, select: Option<&[String]>) -> Result<Metadata> {
        let mut metadata = self.get(key)?.metadata();
        if let Some(select) = select {
            metadata.retain(|k, _| select.iter().any(|name| name == k));
        }
        Ok(metadata)
    }

    fn get_data(&self, key: &str) -> Result<Vec<u8>> {
        let mut value = self.get(key)?;
        let mut buf = Vec::new();
        value.data()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn get_data_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        let mut value = self.get(key)?;
        let mut buf = Vec::new();
        value.range(start, end)?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Never raises for a missing key: the absence itself is the answer.
    fn exists(&self, key: &str) -> bool {
        self.get_metadata(key, None).is_ok()
    }

    /// Entries whose metadata contains every name/value pair in `match_`.
    fn query(&self, select: Option<&[String]>, match_: &Metadata) -> Result<Vec<(String, Metadata)>>;

    fn query_keys(&self, match_: &Metadata) -> Result<Vec<String>> {
        Ok(self
            .query(None, match_)?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    /// Shell-style glob over key strings only (not metadata).
    fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher =
            glob::Pattern::new(pattern).map_err(|e| StoreError::BackendFailure(e.to_string()))?;
        Ok(self
            .query_keys(&Metadata::new())?
            .into_iter()
            .filter(|key| matcher.matches(key))
            .collect())
    }

    fn multiget(&self, keys: &[String]) -> Vec<Result<Value>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    fn multiget_data(&self, keys: &[String]) -> Vec<Result<Vec<u8>>> {
        keys.iter().map(|key| self.get_data(key)).collect()
    }

    fn multiget_metadata(&self, keys: &[String]) -> Vec<Result<Metadata>> {
        keys.iter().map(|key| self.get_metadata(key, None)).collect()
    }

    fn to_bytes(&self, key: &str) -> Result<Vec<u8>> {
        self.get_data(key)
    }

    /// Stream a value's bytes to `dest`, emitting `StoreProgress*` events
    /// along the way.
    fn to_file(&self, key: &str, dest: &mut dyn Write, bus: &EventBus, source: &str) -> Result<()> {
        crate::stream::copy_to_file(self, key, dest, bus, source)
    }
}

/// The full read/write contract.
pub trait Store: ReadableStore {
    fn set(&self, key: &str, data: Vec<u8>, metadata: Metadata) -> Result<()>;

    fn set_data(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let metadata = self.get_metadata(key, None).unwrap_or_default();
        self.set(key, data, metadata)
    }

    fn set_metadata(&self, key: &str, metadata: Metadata) -> Result<()> {
        let data = self.get_data(key)?;
        self.set(key, data, metadata)
    }

    fn update_metadata(&self, key: &str, patch: Metadata) -> Result<()> {
        let mut metadata = self.get_metadata(key, None)?;
        metadata.extend(patch);
        self.set_metadata(key, metadata)
    }

    fn delete(&self, key: &str) -> Result<()>;

    fn transaction(&self, notes: &str) -> Box<dyn TransactionContext + '_>;

    fn multiset(&self, items: Vec<(String, Vec<u8>, Metadata)>) -> Result<()> {
        let tx = self.transaction("multiset");
        for (key, data, metadata) in items {
            if let Err(e) = self.set(&key, data, metadata) {
                let _ = tx.rollback();
                return Err(e);
            }
        }
        tx.commit()
    }

    fn multiset_data(&self, items: Vec<(String, Vec<u8>)>) -> Result<()> {
        let tx = self.transaction("multiset_data");
        for (key, data) in items {
            if let Err(e) = self.set_data(&key, data) {
                let _ = tx.rollback();
                return Err(e);
            }
        }
        tx.commit()
    }

    fn multiset_metadata(&self, items: Vec<(String, Metadata)>) -> Result<()> {
        let tx = self.transaction("multiset_metadata");
        for (key, metadata) in items {
            if let Err(e) = self.set_metadata(&key, metadata) {
                let _ = tx.rollback();
                return Err(e);
            }
        }
        tx.commit()
    }

    fn multiupdate_metadata(&self, items: Vec<(String, Metadata)>) -> Result<()> {
        let tx = self.transaction("multiupdate_metadata");
        for (key, patch) in items {
            if let Err(e) = self.update_metadata(&key, patch) {
                let _ = tx.rollback();
                return Err(e);
            }
        }
        tx.commit()
    }

    fn from_bytes(&self, key: &str, data: Vec<u8>, metadata: Metadata) -> Result<()> {
        self.set(key, data, metadata)
    }

    /// Stream bytes from `source` into `key`, emitting `StoreProgress*`
    /// events along the way.
    fn from_file(
        &self,
        key: &str,
        source_reader: &mut dyn Read,
        metadata: Metadata,
        bus: &EventBus,
        source: &str,
    ) -> Result<()> {
        crate::stream::copy_from_file(self, key, source_reader, metadata, bus, source)
    }
}

/// The `AbstractAuthorizingStore`-equivalent: a store whose entries carry
/// mutable permission grants.
pub trait PermissionedStore: Store {
    fn owner_tag(&self) -> &str;
    fn get_permissions(&self, key: &str) -> Result<Permissions>;
    fn set_permissions(&self, key: &str, permissions: Permissions) -> Result<()>;

    fn update_permissions(&self, key: &str, patch: Permissions) -> Result<()> {
        let mut current = self.get_permissions(key)?;
        current.merge(patch);
        self.set_permissions(key, current)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
