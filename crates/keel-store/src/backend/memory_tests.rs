// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use keel_core::EventClass;
use std::sync::{Arc, Mutex as StdMutex};

fn connected_store() -> MemoryStore {
    let store = MemoryStore::new(EventBus::new(), "mem");
    store.connect().unwrap();
    store
}

#[test]
fn get_before_connect_fails_not_connected() {
    let store = MemoryStore::new(EventBus::new(), "mem");
    assert!(matches!(store.get("k"), Err(StoreError::NotConnected)));
}

#[test]
fn set_then_get_round_trips_data_and_metadata() {
    let store = connected_store();
    let mut metadata = Metadata::new();
    metadata.insert("x".to_owned(), serde_json::json!(1));
    store.set("k", b"abc".to_vec(), metadata.clone()).unwrap();

    assert_eq!(store.get_data("k").unwrap(), b"abc");
    assert_eq!(store.get_metadata("k", None).unwrap(), metadata);
}

#[test]
fn delete_then_get_missing_raises_key_missing() {
    let store = connected_store();
    store.set("k", b"abc".to_vec(), Metadata::new()).unwrap();
    store.delete("k").unwrap();
    assert!(!store.exists("k"));
    assert!(matches!(store.get("k"), Err(StoreError::KeyMissing(_))));
}

#[test]
fn set_emits_set_then_update_on_replace() {
    let store = connected_store();
    let seen: Arc<StdMutex<Vec<StoreModificationKind>>> = Arc::new(StdMutex::new(Vec::new()));
    let seen2 = seen.clone();
    store.bus.connect(EventClass::StoreModification, 0, keel_core::Filters::new(), move |evt| {
        if let Event::StoreModification(e) = evt.event() {
            seen2.lock().unwrap().push(e.kind);
        }
    });

    store.set("k", b"1".to_vec(), Metadata::new()).unwrap();
    store.set("k", b"2".to_vec(), Metadata::new()).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![StoreModificationKind::Set, StoreModificationKind::Update]
    );
}

#[test]
fn query_matches_on_exact_metadata_equality() {
    let store = connected_store();
    let mut a = Metadata::new();
    a.insert("kind".to_owned(), serde_json::json!("a"));
    let mut b = Metadata::new();
    b.insert("kind".to_owned(), serde_json::json!("b"));
    store.set("one", b"1".to_vec(), a).unwrap();
    store.set("two", b"2".to_vec(), b).unwrap();

    let mut match_ = Metadata::new();
    match_.insert("kind".to_owned(), serde_json::json!("a"));
    let keys = store.query_keys(&match_).unwrap();
    assert_eq!(keys, vec!["one".to_owned()]);
}

#[test]
fn glob_filters_keys_by_shell_pattern() {
    let store = connected_store();
    store.set("logs/a", b"1".to_vec(), Metadata::new()).unwrap();
    store.set("logs/b", b"2".to_vec(), Metadata::new()).unwrap();
    store.set("other", b"3".to_vec(), Metadata::new()).unwrap();

    let mut keys = store.glob("logs/*").unwrap();
    keys.sort();
    assert_eq!(keys, vec!["logs/a".to_owned(), "logs/b".to_owned()]);
}

#[test]
fn transaction_drop_commits_and_does_not_delay_visibility() {
    let store = connected_store();
    {
        let _tx = store.transaction("batch");
        store.set("k1", b"1".to_vec(), Metadata::new()).unwrap();
        store.set("k2", b"2".to_vec(), Metadata::new()).unwrap();
    }
    assert!(store.exists("k1"));
    assert!(store.exists("k2"));
}
