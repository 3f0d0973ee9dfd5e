// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The static-URL backend (spec.md §6): a single JSON index downloaded from
//! `index_url` maps every key to its metadata; a key's data lives at
//! `data_root + data_path + urlencode(key)`. A background thread refreshes
//! the index on a fixed interval and diffs it against the cached copy to
//! emit `Set`/`Update`/`Delete` events (scenario S6).
//!
//! REDESIGN FLAGS names this backend's poller explicitly: the original
//! terminates its polling thread by checking whether its opener has been
//! garbage-collected, which Rust has no equivalent of. [`StaticUrlStore::stop`]
//! gives callers an explicit stop signal instead, joined before returning.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use keel_core::{Event, EventBus, StoreKeyEvent, StoreModificationKind};
use parking_lot::Mutex;
use reqwest::blocking::Client;

use crate::store::{Metadata, ReadableStore, Result, StoreError, StoreInfo};
use crate::value::Value;

struct Poller {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Replaces `cache` with `fresh`, emitting one `StoreModification` event per
/// added, changed, or removed key. Shared by [`StaticUrlStore::poll_once`]
/// and the background poller thread so the diff logic lives in one place.
fn diff_and_emit(cache: &mut HashMap<String, Metadata>, fresh: HashMap<String, Metadata>, bus: &EventBus, name: &str) {
    for (key, metadata) in &fresh {
        let kind = match cache.get(key) {
            None => StoreModificationKind::Set,
            Some(old) if old != metadata => StoreModificationKind::Update,
            Some(_) => continue,
        };
        bus.emit(Event::StoreModification(StoreKeyEvent {
            source: name.to_owned(),
            key: key.clone(),
            kind,
        }));
    }
    for key in cache.keys() {
        if !fresh.contains_key(key) {
            bus.emit(Event::StoreModification(StoreKeyEvent {
                source: name.to_owned(),
                key: key.clone(),
                kind: StoreModificationKind::Delete,
            }));
        }
    }
    *cache = fresh;
}

pub struct StaticUrlStore {
    bus: EventBus,
    name: String,
    client: Client,
    index_url: String,
    data_root: String,
    data_path: String,
    poll_interval: Option<Duration>,
    cache: Arc<Mutex<HashMap<String, Metadata>>>,
    connected: Mutex<bool>,
    poller: Mutex<Option<Poller>>,
}

impl StaticUrlStore {
    pub fn new(
        bus: EventBus,
        name: impl Into<String>,
        client: Client,
        index_url: impl Into<String>,
        data_root: impl Into<String>,
        data_path: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            name: name.into(),
            client,
            index_url: index_url.into(),
            data_root: data_root.into(),
            data_path: data_path.into(),
            poll_interval: None,
            cache: Arc::new(Mutex::new(HashMap::new())),
            connected: Mutex::new(false),
            poller: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    fn require_connected(&self) -> Result<()> {
        if *self.connected.lock() {
            Ok(())
        } else {
            Err(StoreError::NotConnected)
        }
    }

    fn fetch_index(&self) -> Result<HashMap<String, Metadata>> {
        let index: HashMap<String, Metadata> = self
            .client
            .get(&self.index_url)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(index)
    }

    fn data_url(&self, key: &str) -> String {
        format!(
            "{}{}{}",
            self.data_root.trim_end_matches('/'),
            self.data_path,
            urlencoding::encode(key)
        )
    }

    /// Refreshes the cached index once, diffing against the previous
    /// contents and emitting exactly one modification event per changed key
    /// (spec.md scenario S6).
    pub fn poll_once(&self) -> Result<()> {
        let fresh = self.fetch_index()?;
        let mut cache = self.cache.lock();
        diff_and_emit(&mut cache, fresh, &self.bus, &self.name);
        Ok(())
    }

    /// Stops the background poller, joining its thread. Safe to call when no
    /// poller is running (e.g. `poll_interval` was never set) or more than
    /// once.
    pub fn stop(&self) {
        if let Some(poller) = self.poller.lock().take() {
            poller.stop.store(true, Ordering::SeqCst);
            let _ = poller.handle.join();
        }
    }
}

impl ReadableStore for StaticUrlStore {
    fn connect(&self) -> Result<()> {
        let index = self.fetch_index()?;
        *self.cache.lock() = index;
        *self.connected.lock() = true;

        if let Some(interval) = self.poll_interval {
            let stop = Arc::new(AtomicBool::new(false));
            let thread_stop = stop.clone();
            let client = self.client.clone();
            let index_url = self.index_url.clone();
            let cache = self.cache.clone();
            let bus = self.bus.clone();
            let name = self.name.clone();
            let handle = std::thread::spawn(move || {
                while !thread_stop.load(Ordering::SeqCst) {
                    std::thread::sleep(interval);
                    if thread_stop.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(response) = client.get(&index_url).send() else {
                        continue;
                    };
                    let Ok(response) = response.error_for_status() else {
                        continue;
                    };
                    let Ok(fresh) = response.json::<HashMap<String, Metadata>>() else {
                        continue;
                    };
                    let mut cache = cache.lock();
                    diff_and_emit(&mut cache, fresh, &bus, &name);
                }
            });
            *self.poller.lock() = Some(Poller { stop, handle });
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        self.stop();
        *self.connected.lock() = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    fn info(&self) -> StoreInfo {
        StoreInfo {
            readonly: true,
            authorizing: false,
        }
    }

    fn get(&self, key: &str) -> Result<Value> {
        self.require_connected()?;
        let metadata = self
            .cache
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::KeyMissing(key.to_owned()))?;
        let data = self
            .client
            .get(self.data_url(key))
            .send()?
            .error_for_status()?
            .bytes()?
            .to_vec();
        Ok(Value::from_url(data, metadata, None, None))
    }

    fn get_metadata(&self, key: &str, select: Option<&[String]>) -> Result<Metadata> {
        self.require_connected()?;
        let mut metadata = self
            .cache
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::KeyMissing(key.to_owned()))?;
        if let Some(select) = select {
            metadata.retain(|k, _| select.iter().any(|name| name == k));
        }
        Ok(metadata)
    }

    fn query(&self, select: Option<&[String]>, match_: &Metadata) -> Result<Vec<(String, Metadata)>> {
        self.require_connected()?;
        let cache = self.cache.lock();
        Ok(cache
            .iter()
            .filter(|(_, metadata)| match_.iter().all(|(k, v)| metadata.get(k) == Some(v)))
            .map(|(key, metadata)| {
                let mut metadata = metadata.clone();
                if let Some(select) = select {
                    metadata.retain(|k, _| select.iter().any(|name| name == k));
                }
                (key.clone(), metadata)
            })
            .collect())
    }
}

impl Drop for StaticUrlStore {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "static_url_tests.rs"]
mod tests;
