// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The mounted composite backend, grounded on
//! `encore/storage/mounted_store.py`: a store (`mount_store`) mounted at a
//! key prefix over a `backing_store`. Keys beginning with the prefix are
//! served from the mount (short key with the prefix stripped); any other
//! key, or a prefixed key absent from the mount, falls through to the
//! backing store.
//!
//! Writes to a prefixed key are copy-on-write: if the mount doesn't have the
//! key yet but the backing store does, the backing store's current value is
//! copied into the mount first, then the mutation proceeds against the
//! mount. [`MountedStore::push`] moves a key the other way, from the mount
//! back to the backing store.
//!
//! Per spec.md's Open Question resolution, every key passed to this store's
//! write operations must already carry the mount prefix — there is no
//! inference of which keys "belong" to the mount from metadata alone, only
//! from the key's spelling.

use std::collections::HashSet;
use std::sync::Arc;

use crate::store::{Metadata, ReadableStore, Result, Store, StoreError, StoreInfo};
use crate::transaction::TransactionContext;
use crate::value::Value;

pub struct MountedStore {
    mount_point: String,
    mount_store: Arc<dyn Store>,
    backing_store: Arc<dyn Store>,
}

impl MountedStore {
    pub fn new(mount_point: impl Into<String>, mount_store: Arc<dyn Store>, backing_store: Arc<dyn Store>) -> Self {
        Self {
            mount_point: mount_point.into(),
            mount_store,
            backing_store,
        }
    }

    fn short_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.mount_point.as_str())
    }

    /// Copies `full_key`'s current value from the backing store into the
    /// mount if the mount doesn't have it yet but the backing store does.
    fn copy_on_write(&self, full_key: &str, short_key: &str) -> Result<()> {
        if !self.mount_store.exists(short_key) && self.backing_store.exists(full_key) {
            let data = self.backing_store.get_data(full_key)?;
            let metadata = self.backing_store.get_metadata(full_key, None)?;
            self.mount_store.set(short_key, data, metadata)?;
        }
        Ok(())
    }

    /// Moves a key from the mount store to the backing store.
    pub fn push(&self, key: &str) -> Result<()> {
        let short = self.short_key(key).ok_or_else(|| StoreError::KeyMissing(key.to_owned()))?;
        let data = self.mount_store.get_data(short)?;
        let metadata = self.mount_store.get_metadata(short, None)?;
        self.backing_store.set(key, data, metadata)?;
        self.mount_store.delete(short)?;
        Ok(())
    }
}

impl ReadableStore for MountedStore {
    fn connect(&self) -> Result<()> {
        if !self.mount_store.is_connected() {
            self.mount_store.connect()?;
        }
        if !self.backing_store.is_connected() {
            self.backing_store.connect()?;
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        self.mount_store.disconnect()?;
        self.backing_store.disconnect()?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.mount_store.is_connected() && self.backing_store.is_connected()
    }

    fn info(&self) -> StoreInfo {
        StoreInfo {
            readonly: false,
            authorizing: false,
        }
    }

    fn get(&self, key: &str) -> Result<Value> {
        if let Some(short) = self.short_key(key) {
            if self.mount_store.exists(short) {
                return self.mount_store.get(short);
            }
        }
        if self.backing_store.exists(key) {
            return self.backing_store.get(key);
        }
        Err(StoreError::KeyMissing(key.to_owned()))
    }

    fn query(&self, select: Option<&[String]>, match_: &Metadata) -> Result<Vec<(String, Metadata)>> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for (key, metadata) in self.mount_store.query(select, match_)? {
            let full_key = format!("{}{}", self.mount_point, key);
            seen.insert(full_key.clone());
            results.push((full_key, metadata));
        }
        for (key, metadata) in self.backing_store.query(select, match_)? {
            if !seen.contains(&key) {
                results.push((key, metadata));
            }
        }
        Ok(results)
    }
}

impl Store for MountedStore {
    fn set(&self, key: &str, data: Vec<u8>, metadata: Metadata) -> Result<()> {
        let short = self.short_key(key).ok_or_else(|| StoreError::KeyMissing(key.to_owned()))?;
        self.copy_on_write(key, short)?;
        self.mount_store.set(short, data, metadata)
    }

    fn update_metadata(&self, key: &str, patch: Metadata) -> Result<()> {
        let short = self.short_key(key).ok_or_else(|| StoreError::KeyMissing(key.to_owned()))?;
        self.copy_on_write(key, short)?;
        self.mount_store.update_metadata(short, patch)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let short = self.short_key(key).ok_or_else(|| StoreError::KeyMissing(key.to_owned()))?;
        if self.mount_store.exists(short) {
            return self.mount_store.delete(short);
        }
        Err(StoreError::KeyMissing(key.to_owned()))
    }

    fn transaction(&self, notes: &str) -> Box<dyn TransactionContext + '_> {
        self.mount_store.transaction(notes)
    }
}

#[cfg(test)]
#[path = "mounted_tests.rs"]
mod tests;
