// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The joined composite backend, grounded on
//! `encore/storage/joined_store.py`: an ordered list of stores presenting
//! the union of their keys. Reads and deletes probe stores in order and act
//! on the first one where the key exists; writes always land in the first
//! store; queries merge results with first-occurrence wins (an earlier
//! store's copy of a key, matching or not, shadows a later store's).
//!
//! Every member store keeps emitting events through its own bus exactly as
//! it would standalone — `JoinedStore` does not re-emit them. Its own
//! `transaction()` is a [`DummyTransaction`] bracketing only its own
//! Start/End events, matching `joined_store.py`'s use of
//! `DummyTransactionContext(self)` rather than opening a transaction on any
//! member store.
//!
//! This crate's `PermissionedStore` trait is deliberately not implemented
//! here: members are plain `Store` trait objects, and not every backend in
//! this crate supports permissions, so there is no uniform way to propagate
//! `get_permissions`/`set_permissions` across a mixed membership. Compose at
//! the `PermissionedStore` layer directly if every member supports it.

use std::sync::Arc;

use keel_core::EventBus;

use crate::store::{Metadata, ReadableStore, Result, Store, StoreError, StoreInfo};
use crate::transaction::{DummyTransaction, TransactionContext};
use crate::value::Value;

pub struct JoinedStore {
    bus: EventBus,
    name: String,
    stores: Vec<Arc<dyn Store>>,
}

impl JoinedStore {
    pub fn new(bus: EventBus, name: impl Into<String>, stores: Vec<Arc<dyn Store>>) -> Self {
        Self {
            bus,
            name: name.into(),
            stores,
        }
    }

    fn shadowed_by_earlier(&self, upto: usize, key: &str) -> bool {
        self.stores[..upto].iter().any(|s| s.exists(key))
    }
}

impl ReadableStore for JoinedStore {
    fn connect(&self) -> Result<()> {
        for store in &self.stores {
            if !store.is_connected() {
                store.connect()?;
            }
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        for store in &self.stores {
            store.disconnect()?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stores.iter().all(|s| s.is_connected())
    }

    fn info(&self) -> StoreInfo {
        StoreInfo {
            readonly: false,
            authorizing: false,
        }
    }

    fn get(&self, key: &str) -> Result<Value> {
        for store in &self.stores {
            if store.exists(key) {
                return store.get(key);
            }
        }
        Err(StoreError::KeyMissing(key.to_owned()))
    }

    fn query(&self, select: Option<&[String]>, match_: &Metadata) -> Result<Vec<(String, Metadata)>> {
        let mut results = Vec::new();
        for (index, store) in self.stores.iter().enumerate() {
            for (key, metadata) in store.query(select, match_)? {
                if !self.shadowed_by_earlier(index, &key) {
                    results.push((key, metadata));
                }
            }
        }
        Ok(results)
    }
}

impl Store for JoinedStore {
    fn set(&self, key: &str, data: Vec<u8>, metadata: Metadata) -> Result<()> {
        let first = self
            .stores
            .first()
            .ok_or_else(|| StoreError::BackendFailure("joined store has no members".to_owned()))?;
        first.set(key, data, metadata)
    }

    fn delete(&self, key: &str) -> Result<()> {
        for store in &self.stores {
            if store.exists(key) {
                return store.delete(key);
            }
        }
        Err(StoreError::KeyMissing(key.to_owned()))
    }

    fn transaction(&self, _notes: &str) -> Box<dyn TransactionContext + '_> {
        DummyTransaction::begin(self.bus.clone(), self.name.clone())
    }
}

#[cfg(test)]
#[path = "joined_tests.rs"]
mod tests;
