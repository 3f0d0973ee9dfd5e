// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use keel_core::EventBus;

use super::*;
use crate::backend::memory::MemoryStore;

fn connected_memory(name: &str) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new(EventBus::new(), name));
    store.connect().unwrap();
    store
}

fn member(store: Arc<MemoryStore>) -> Arc<dyn Store> {
    store
}

#[test]
fn get_prefers_mount_over_backing_for_prefixed_keys() {
    let mount = connected_memory("mount");
    let backing = connected_memory("backing");
    mount.set("a", b"from-mount".to_vec(), Metadata::new()).unwrap();
    backing.set("cache/a", b"from-backing".to_vec(), Metadata::new()).unwrap();

    let store = MountedStore::new("cache/", member(mount), member(backing));
    assert_eq!(store.get_data("cache/a").unwrap(), b"from-mount");
}

#[test]
fn get_falls_through_to_backing_when_mount_lacks_the_key() {
    let mount = connected_memory("mount");
    let backing = connected_memory("backing");
    backing.set("cache/a", b"from-backing".to_vec(), Metadata::new()).unwrap();

    let store = MountedStore::new("cache/", member(mount), member(backing));
    assert_eq!(store.get_data("cache/a").unwrap(), b"from-backing");
}

#[test]
fn get_serves_unprefixed_keys_from_backing_store() {
    let mount = connected_memory("mount");
    let backing = connected_memory("backing");
    backing.set("plain", b"from-backing".to_vec(), Metadata::new()).unwrap();

    let store = MountedStore::new("cache/", member(mount), member(backing));
    assert_eq!(store.get_data("plain").unwrap(), b"from-backing");
}

#[test]
fn set_on_a_prefixed_key_not_yet_in_the_mount_copies_on_write() {
    let mount = connected_memory("mount");
    let backing = connected_memory("backing");
    let mut metadata = Metadata::new();
    metadata.insert("x".to_owned(), serde_json::json!(1));
    backing.set("cache/a", b"old".to_vec(), metadata).unwrap();

    let store = MountedStore::new("cache/", member(mount.clone()), member(backing.clone()));
    store.set("cache/a", b"new".to_vec(), Metadata::new()).unwrap();

    assert_eq!(mount.get_data("a").unwrap(), b"new");
    assert_eq!(backing.get_data("cache/a").unwrap(), b"old");
}

#[test]
fn set_without_the_mount_prefix_fails() {
    let mount = connected_memory("mount");
    let backing = connected_memory("backing");
    let store = MountedStore::new("cache/", member(mount), member(backing));
    assert!(store.set("plain", b"x".to_vec(), Metadata::new()).is_err());
}

#[test]
fn push_moves_a_key_from_mount_to_backing_store() {
    let mount = connected_memory("mount");
    let backing = connected_memory("backing");
    let mut metadata = Metadata::new();
    metadata.insert("x".to_owned(), serde_json::json!(1));
    mount.set("a", b"moveme".to_vec(), metadata.clone()).unwrap();

    let store = MountedStore::new("cache/", member(mount.clone()), member(backing.clone()));
    store.push("cache/a").unwrap();

    assert!(mount.get("a").is_err());
    assert_eq!(backing.get_data("cache/a").unwrap(), b"moveme");
    assert_eq!(backing.get_metadata("cache/a", None).unwrap(), metadata);
}

#[test]
fn query_merges_mount_and_backing_with_mount_precedence() {
    let mount = connected_memory("mount");
    let backing = connected_memory("backing");
    let mut tagged = Metadata::new();
    tagged.insert("kind".to_owned(), serde_json::json!("target"));

    mount.set("a", b"from-mount".to_vec(), tagged.clone()).unwrap();
    backing.set("cache/a", b"from-backing".to_vec(), tagged.clone()).unwrap();
    backing.set("plain", b"other".to_vec(), tagged.clone()).unwrap();

    let store = MountedStore::new("cache/", member(mount), member(backing));
    let mut results = store.query(None, &tagged).unwrap();
    results.sort_by(|(k1, _), (k2, _)| k1.cmp(k2));
    let keys: Vec<String> = results.into_iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec!["cache/a".to_owned(), "plain".to_owned()]);
}
