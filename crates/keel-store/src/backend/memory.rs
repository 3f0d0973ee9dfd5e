// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-memory backend: no Python analogue is named in spec.md beyond
//! "in-memory map", so this is grounded on the general
//! `AbstractStore` contract plus spec.md §4.F's description ("O(1) get/set;
//! buffered bytes; supports query by linear scan; no transaction rollback").

use std::collections::HashMap;

use keel_core::{Event, EventBus, StoreKeyEvent, StoreModificationKind};
use parking_lot::Mutex;

use crate::store::{Metadata, ReadableStore, Result, Store, StoreError, StoreInfo};
use crate::transaction::{DummyTransaction, TransactionContext};
use crate::value::Value;

struct Entry {
    data: Vec<u8>,
    metadata: Metadata,
    created: u64,
    modified: u64,
}

pub struct MemoryStore {
    bus: EventBus,
    name: String,
    connected: Mutex<bool>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new(bus: EventBus, name: impl Into<String>) -> Self {
        Self {
            bus,
            name: name.into(),
            connected: Mutex::new(false),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn require_connected(&self) -> Result<()> {
        if *self.connected.lock() {
            Ok(())
        } else {
            Err(StoreError::NotConnected)
        }
    }

    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

impl ReadableStore for MemoryStore {
    fn connect(&self) -> Result<()> {
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
        let entries = self.entries.lock();
        let entry = entries.get(key).ok_or_else(|| StoreError::KeyMissing(key.to_owned()))?;
        Ok(Value::from_bytes(
            entry.data.clone(),
            entry.metadata.clone(),
            None,
            Some(entry.created),
            Some(entry.modified),
        ))
    }

    fn query(&self, select: Option<&[String]>, match_: &Metadata) -> Result<Vec<(String, Metadata)>> {
        self.require_connected()?;
        let entries = self.entries.lock();
        Ok(entries
            .iter()
            .filter(|(_, entry)| {
                match_
                    .iter()
                    .all(|(k, v)| entry.metadata.get(k) == Some(v))
            })
            .map(|(key, entry)| {
                let mut metadata = entry.metadata.clone();
                if let Some(select) = select {
                    metadata.retain(|k, _| select.iter().any(|name| name == k));
                }
                (key.clone(), metadata)
            })
            .collect())
    }
}

impl Store for MemoryStore {
    fn set(&self, key: &str, data: Vec<u8>, metadata: Metadata) -> Result<()> {
        self.require_connected()?;
        let now = self.now();
        let kind = {
            let mut entries = self.entries.lock();
            let kind = if entries.contains_key(key) {
                StoreModificationKind::Update
            } else {
                StoreModificationKind::Set
            };
            let created = entries.get(key).map(|e| e.created).unwrap_or(now);
            entries.insert(
                key.to_owned(),
                Entry {
                    data,
                    metadata,
                    created,
                    modified: now,
                },
            );
            kind
        };
        self.bus.emit(Event::StoreModification(StoreKeyEvent {
            source: self.name.clone(),
            key: key.to_owned(),
            kind,
        }));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.require_connected()?;
        {
            let mut entries = self.entries.lock();
            if entries.remove(key).is_none() {
                return Err(StoreError::KeyMissing(key.to_owned()));
            }
        }
        self.bus.emit(Event::StoreModification(StoreKeyEvent {
            source: self.name.clone(),
            key: key.to_owned(),
            kind: StoreModificationKind::Delete,
        }));
        Ok(())
    }

    fn transaction(&self, _notes: &str) -> Box<dyn TransactionContext + '_> {
        DummyTransaction::begin(self.bus.clone(), self.name.clone())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
