// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The dynamic-URL backend (spec.md §6): each operation maps to an HTTP verb
//! against `root/<key>/{data|metadata|permissions}` over a caller-supplied
//! `reqwest::blocking::Client` (already authenticated — this store never
//! handles credentials itself). HTTP 404 becomes `KeyMissing`, 403 becomes
//! `PermissionDenied`.
//!
//! The external-interfaces table (spec.md §6) lists `GET`/`PUT`/`POST` for
//! `/data` and `/metadata` but no verb for deleting a key; since `delete` is
//! part of every store's base contract (§4.F), this backend maps it onto
//! `DELETE /<key>/data` — the natural REST extension of the documented verb
//! set, recorded as an Open Question resolution in DESIGN.md.

use keel_core::{Event, EventBus, StoreKeyEvent, StoreModificationKind};
use parking_lot::Mutex;
use reqwest::blocking::Client;

use crate::permissions::Permissions;
use crate::store::{Metadata, PermissionedStore, ReadableStore, Result, Store, StoreError, StoreInfo};
use crate::transaction::{DummyTransaction, TransactionContext};
use crate::value::Value;

pub struct DynamicUrlStore {
    bus: EventBus,
    name: String,
    client: Client,
    root: String,
    owner_tag: String,
    connected: Mutex<bool>,
}

impl DynamicUrlStore {
    pub fn new(
        bus: EventBus,
        name: impl Into<String>,
        client: Client,
        root: impl Into<String>,
        owner_tag: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            name: name.into(),
            client,
            root: root.into(),
            owner_tag: owner_tag.into(),
            connected: Mutex::new(false),
        }
    }

    fn url(&self, key: &str, suffix: &str) -> String {
        format!(
            "{}/{}/{}",
            self.root.trim_end_matches('/'),
            urlencoding::encode(key),
            suffix
        )
    }

    fn require_connected(&self) -> Result<()> {
        if *self.connected.lock() {
            Ok(())
        } else {
            Err(StoreError::NotConnected)
        }
    }

    fn emit_modification(&self, key: &str, kind: StoreModificationKind) {
        self.bus.emit(Event::StoreModification(StoreKeyEvent {
            source: self.name.clone(),
            key: key.to_owned(),
            kind,
        }));
    }
}

impl ReadableStore for DynamicUrlStore {
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
            authorizing: true,
        }
    }

    fn get(&self, key: &str) -> Result<Value> {
        self.require_connected()?;
        let data = self
            .client
            .get(self.url(key, "data"))
            .send()?
            .error_for_status()?
            .bytes()?
            .to_vec();
        let metadata = self.get_metadata(key, None)?;
        Ok(Value::from_url(data, metadata, None, None))
    }

    fn get_metadata(&self, key: &str, select: Option<&[String]>) -> Result<Metadata> {
        self.require_connected()?;
        let response = self
            .client
            .get(self.url(key, "metadata"))
            .send()?
            .error_for_status()?;
        let mut metadata: Metadata = response.json()?;
        if let Some(select) = select {
            metadata.retain(|k, _| select.iter().any(|name| name == k));
        }
        Ok(metadata)
    }

    fn query(&self, select: Option<&[String]>, match_: &Metadata) -> Result<Vec<(String, Metadata)>> {
        self.require_connected()?;
        let params: Vec<(String, String)> = match_
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();
        let body = self
            .client
            .get(format!("{}/query", self.root.trim_end_matches('/')))
            .query(&params)
            .send()?
            .error_for_status()?
            .text()?;
        let keys: Vec<String> = body.lines().filter(|l| !l.is_empty()).map(str::to_owned).collect();

        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let metadata = self.get_metadata(&key, select)?;
            results.push((key, metadata));
        }
        Ok(results)
    }
}

impl Store for DynamicUrlStore {
    fn set(&self, key: &str, data: Vec<u8>, metadata: Metadata) -> Result<()> {
        self.require_connected()?;
        let kind = if self.exists(key) {
            StoreModificationKind::Update
        } else {
            StoreModificationKind::Set
        };
        self.client
            .put(self.url(key, "data"))
            .body(data)
            .send()?
            .error_for_status()?;
        self.client
            .put(self.url(key, "metadata"))
            .json(&metadata)
            .send()?
            .error_for_status()?;
        self.emit_modification(key, kind);
        Ok(())
    }

    fn update_metadata(&self, key: &str, patch: Metadata) -> Result<()> {
        self.require_connected()?;
        self.client
            .post(self.url(key, "metadata"))
            .json(&patch)
            .send()?
            .error_for_status()?;
        self.emit_modification(key, StoreModificationKind::Update);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.require_connected()?;
        self.client
            .delete(self.url(key, "data"))
            .send()?
            .error_for_status()?;
        self.emit_modification(key, StoreModificationKind::Delete);
        Ok(())
    }

    fn transaction(&self, _notes: &str) -> Box<dyn TransactionContext + '_> {
        // Remote stores have no local atomicity to offer; bracket events
        // only, matching every non-transactional backend in this crate.
        DummyTransaction::begin(self.bus.clone(), self.name.clone())
    }
}

impl PermissionedStore for DynamicUrlStore {
    fn owner_tag(&self) -> &str {
        &self.owner_tag
    }

    fn get_permissions(&self, key: &str) -> Result<Permissions> {
        self.require_connected()?;
        let response = self
            .client
            .get(self.url(key, "permissions"))
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }

    fn set_permissions(&self, key: &str, permissions: Permissions) -> Result<()> {
        self.require_connected()?;
        self.client
            .put(self.url(key, "permissions"))
            .json(&permissions)
            .send()?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "dynamic_url_tests.rs"]
mod tests;
