// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenario tests (spec.md §8 S1-S7) and the universal
//! properties listed alongside them, exercised against the real crates
//! rather than any single module's own unit tests.

use std::io::{BufRead, BufReader, Write as _};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use keel_core::test_support::EventRecorder;
use keel_core::{EventBus, EventClass};
use keel_lock::FileLock;
use keel_scheduler::scheduler::{Asynchronizer, Serializer};
use keel_scheduler::{Future as JobFuture, WorkerPool};
use keel_store::backend::fs::{init_store_root, FileSystemStore};
use keel_store::backend::locking_fs::LockingFileSystemStore;
use keel_store::backend::memory::MemoryStore;
use keel_store::backend::static_url::StaticUrlStore;
use keel_store::{Metadata, ReadableStore, Store, StoreError, TransactionContext};
use proptest::prelude::*;
use tempfile::tempdir;

// S1 Serializer ordering: one worker, ten submissions, strict FIFO result.
#[test]
fn s1_serializer_runs_every_submission_in_order() {
    let pool = WorkerPool::new(1, "s1-serializer");
    let serializer = Serializer::new(Arc::new(pool));
    let observed = Arc::new(StdMutex::new(Vec::new()));

    let futures: Vec<JobFuture<()>> = (1..=10)
        .map(|n| {
            let observed = observed.clone();
            serializer
                .submit(move || {
                    std::thread::sleep(Duration::from_millis(5));
                    observed.lock().unwrap_or_else(|e| e.into_inner()).push(n);
                })
                .unwrap()
        })
        .collect();

    for future in futures {
        future.result(Some(Duration::from_secs(5))).unwrap();
    }

    assert_eq!(
        *observed.lock().unwrap_or_else(|e| e.into_inner()),
        (1..=10).collect::<Vec<_>>()
    );
}

// S2 coalescing: a burst of quick submissions behind a slow in-flight job
// collapses to exactly the first and the last.
#[test]
fn s2_asynchronizer_coalesces_a_burst_to_first_and_last() {
    let pool = WorkerPool::new(1, "s2-coalesce");
    let asynchronizer = Asynchronizer::new(Arc::new(pool));
    let queue = Arc::new(StdMutex::new(Vec::new()));

    let mut last = None;
    for n in 1..=10 {
        let queue = queue.clone();
        last = Some(
            asynchronizer
                .submit(move || {
                    if n == 1 {
                        std::thread::sleep(Duration::from_millis(250));
                    }
                    queue.lock().unwrap_or_else(|e| e.into_inner()).push(n);
                })
                .unwrap(),
        );
    }
    last.unwrap().result(Some(Duration::from_secs(5))).unwrap();

    assert_eq!(*queue.lock().unwrap_or_else(|e| e.into_inner()), vec![1, 10]);
}

// S3 two independent Asynchronizers ("worker A", "worker B") sharing one
// worker pool. Each coalesces its own burst to first/last; the pool's
// single thread naturally serializes A's run before B's.
#[test]
fn s3_two_asynchronizers_share_a_pool_and_observe_their_own_first_and_last() {
    fn as_executor(pool: Arc<WorkerPool>) -> Arc<dyn keel_scheduler::Executor> {
        pool
    }

    let pool = Arc::new(WorkerPool::new(1, "s3-shared-pool"));
    let worker_a = Asynchronizer::new(as_executor(pool.clone()));
    let worker_b = Asynchronizer::new(as_executor(pool.clone()));

    let a_observed = Arc::new(StdMutex::new(Vec::new()));
    let b_observed = Arc::new(StdMutex::new(Vec::new()));
    let completions = Arc::new(StdMutex::new(Vec::new()));

    let mut a_last = None;
    for n in 1..=10 {
        let a_observed = a_observed.clone();
        let completions = completions.clone();
        a_last = Some(
            worker_a
                .submit(move || {
                    if n == 1 {
                        std::thread::sleep(Duration::from_millis(200));
                    }
                    a_observed.lock().unwrap_or_else(|e| e.into_inner()).push(n);
                    completions.lock().unwrap_or_else(|e| e.into_inner()).push(n);
                })
                .unwrap(),
        );
    }

    let mut b_last = None;
    for n in 11..=20 {
        let b_observed = b_observed.clone();
        let completions = completions.clone();
        b_last = Some(
            worker_b
                .submit(move || {
                    b_observed.lock().unwrap_or_else(|e| e.into_inner()).push(n);
                    completions.lock().unwrap_or_else(|e| e.into_inner()).push(n);
                })
                .unwrap(),
        );
    }

    a_last.unwrap().result(Some(Duration::from_secs(5))).unwrap();
    b_last.unwrap().result(Some(Duration::from_secs(5))).unwrap();

    assert_eq!(*a_observed.lock().unwrap_or_else(|e| e.into_inner()), vec![1, 10]);
    assert_eq!(*b_observed.lock().unwrap_or_else(|e| e.into_inner()), vec![20]);
    assert_eq!(
        *completions.lock().unwrap_or_else(|e| e.into_inner()),
        vec![1, 10, 20]
    );
}

// S4 in-memory store set/get/delete, with the `StoreSetEvent`/
// `StoreDeleteEvent` visibility property (universal property 5/6) checked
// alongside.
#[test]
fn s4_memory_store_set_get_delete_round_trip() {
    let bus = EventBus::new();
    let recorder = EventRecorder::attach(&bus, EventClass::StoreModification);
    let store = MemoryStore::new(bus, "s4-memory");
    store.connect().unwrap();

    let mut metadata = Metadata::new();
    metadata.insert("x".to_owned(), serde_json::json!(1));
    store.set("k", b"abc".to_vec(), metadata.clone()).unwrap();

    assert_eq!(store.get_data("k").unwrap(), b"abc");
    let select = vec!["x".to_owned()];
    assert_eq!(store.get_metadata("k", Some(&select)).unwrap(), metadata);

    store.delete("k").unwrap();
    assert!(!store.exists("k"));
    assert!(matches!(store.get("k"), Err(StoreError::KeyMissing(_))));

    let events = recorder.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].class(), EventClass::StoreSet);
    assert_eq!(events[1].class(), EventClass::StoreDelete);
}

// Universal property 4: a key never set reports `exists() == false` and
// `get` raises `KeyMissing`.
#[test]
fn missing_key_never_exists_and_get_fails() {
    let store = MemoryStore::new(EventBus::new(), "missing-key");
    store.connect().unwrap();
    assert!(!store.exists("nope"));
    assert!(matches!(store.get("nope"), Err(StoreError::KeyMissing(_))));
}

// S5 locking filesystem transaction rollback: a set inside a transaction
// that's rolled back is never visible, and no `StoreSetEvent` is delivered.
#[test]
fn s5_locking_filesystem_transaction_rollback_discards_its_mutation() {
    let dir = tempdir().unwrap();
    init_store_root(dir.path(), ".FSStore").unwrap();
    let bus = EventBus::new();
    let recorder = EventRecorder::attach(&bus, EventClass::StoreModification);
    let inner = FileSystemStore::new(bus, "s5-fs", dir.path());
    inner.connect().unwrap();
    let store = LockingFileSystemStore::new(inner, "s5-locker");

    let tx = store.transaction("rollback me");
    store.set("k1", b"v1".to_vec(), Metadata::new()).unwrap();
    tx.rollback().unwrap();

    assert!(!store.exists("k1"));
    assert!(recorder.events().iter().all(|e| e.class() != EventClass::StoreSet));
}

// S6 static-URL cache refresh: one poll that adds a key emits exactly one
// `Set`; a following poll that changes an existing key's metadata emits
// exactly one `Update`.
#[test]
fn s6_static_url_poll_emits_set_then_update() {
    let index = Arc::new(StdMutex::new(String::from(r#"{"a":{"t":1}}"#)));
    let port = spawn_index_server(index.clone());

    let bus = EventBus::new();
    let recorder = EventRecorder::attach(&bus, EventClass::StoreModification);
    let client = reqwest::blocking::Client::new();
    let store = StaticUrlStore::new(
        bus,
        "s6-static",
        client,
        format!("http://127.0.0.1:{port}/index"),
        format!("http://127.0.0.1:{port}"),
        "/data/".to_owned(),
    );
    store.connect().unwrap();
    assert!(recorder.is_empty(), "connect's initial fetch must not emit events");

    *index.lock().unwrap_or_else(|e| e.into_inner()) = r#"{"a":{"t":1},"b":{"t":2}}"#.to_owned();
    store.poll_once().unwrap();
    let after_first_poll = recorder.events();
    assert_eq!(after_first_poll.len(), 1);
    assert_eq!(after_first_poll[0].class(), EventClass::StoreSet);

    *index.lock().unwrap_or_else(|e| e.into_inner()) = r#"{"a":{"t":3},"b":{"t":2}}"#.to_owned();
    store.poll_once().unwrap();
    let all_events = recorder.events();
    let after_second_poll = &all_events[1..];
    assert_eq!(after_second_poll.len(), 1);
    assert_eq!(after_second_poll[0].class(), EventClass::StoreUpdate);
}

/// Single-threaded mock server answering every request with the current
/// contents of `index` as the body, regardless of path. Good enough for
/// exercising `StaticUrlStore::connect`/`poll_once`, which only ever hits
/// the index URL in this test.
fn spawn_index_server(index: Arc<StdMutex<String>>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let index = index.clone();
            std::thread::spawn(move || serve_index(stream, &index));
        }
    });
    port
}

fn serve_index(mut stream: TcpStream, index: &StdMutex<String>) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).unwrap_or(0) == 0 || header == "\r\n" {
            break;
        }
    }
    let body = index.lock().unwrap_or_else(|e| e.into_inner()).clone();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

// S7 FileLock forced break: a second holder requesting acquisition with a
// short force-timeout gains the lock once it's stale, and the first
// holder's `acquired()` flips to false.
#[test]
fn s7_file_lock_forced_break_transfers_ownership() {
    let dir = tempdir().unwrap();
    let first = FileLock::new(dir.path(), "resource", "holder-1").with_poll_interval(Duration::from_millis(10));
    first.acquire().unwrap();
    assert!(first.acquired());

    let second = FileLock::new(dir.path(), "resource", "holder-2")
        .with_poll_interval(Duration::from_millis(10))
        .with_force_timeout(Duration::from_millis(100));

    std::thread::sleep(Duration::from_millis(150));
    second.acquire().unwrap();

    assert!(second.acquired());
    assert!(!first.acquired());
}

// Universal property 10: two distinct-uid lock holders over the same path
// never both report `acquired() == true`.
#[test]
fn file_lock_mutual_exclusion_holds_across_distinct_uids() {
    let dir = tempdir().unwrap();
    let a = FileLock::new(dir.path(), "mutex", "a");
    let b = FileLock::new(dir.path(), "mutex", "b").with_timeout(Duration::from_millis(50));

    a.acquire().unwrap();
    assert!(a.acquired());
    assert!(b.acquire().is_err());
    assert!(!b.acquired());

    a.release().unwrap();
    b.acquire().unwrap();
    assert!(b.acquired());
    assert!(!a.acquired());
}

// Universal property 8: `get_metadata` is idempotent absent any mutation.
#[test]
fn get_metadata_is_idempotent_absent_mutation() {
    let store = MemoryStore::new(EventBus::new(), "idempotent");
    store.connect().unwrap();
    let mut metadata = Metadata::new();
    metadata.insert("k".to_owned(), serde_json::json!("v"));
    store.set("key", b"data".to_vec(), metadata).unwrap();

    let first = store.get_metadata("key", None).unwrap();
    let second = store.get_metadata("key", None).unwrap();
    assert_eq!(first, second);
}

proptest::proptest! {
    // Universal property 3: for any bytes and JSON-safe metadata value,
    // set-then-get round-trips both exactly.
    #[test]
    fn set_then_get_round_trips_data_and_metadata(
        data in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256),
        tag in "[a-z]{1,12}",
    ) {
        let store = MemoryStore::new(EventBus::new(), "prop-roundtrip");
        store.connect().unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("tag".to_owned(), serde_json::json!(tag));

        store.set("k", data.clone(), metadata.clone()).unwrap();

        prop_assert_eq!(store.get_data("k").unwrap(), data);
        prop_assert_eq!(store.get_metadata("k", None).unwrap(), metadata);
    }
}

// §4.B/§4.C: once a scheduler is shut down, it refuses further submissions
// rather than silently returning a future that never resolves.
#[test]
fn scheduler_submit_after_shutdown_is_refused() {
    use keel_scheduler::scheduler::Asynchronizer;

    let pool = WorkerPool::new(1, "scheduler-shutdown");
    let asynchronizer = Asynchronizer::new(Arc::new(pool));
    let ran = Arc::new(AtomicU32::new(0));

    let ran1 = ran.clone();
    asynchronizer
        .submit(move || {
            ran1.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap()
        .result(Some(Duration::from_secs(2)))
        .unwrap();

    asynchronizer.shutdown();
    assert!(asynchronizer.submit(|| ()).is_err());
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

// `SerializingAsynchronizer` keys its single pending slot by callable
// identity: two distinct keys submitted while busy each queue and run,
// in the order they were first submitted, rather than coalescing together.
#[test]
fn serializing_asynchronizer_keeps_distinct_keys_separate_while_busy() {
    use keel_scheduler::scheduler::SerializingAsynchronizer;

    let pool = WorkerPool::new(1, "serializing-asynchronizer-keys");
    let scheduler = SerializingAsynchronizer::new(Arc::new(pool));
    let observed = Arc::new(StdMutex::new(Vec::new()));

    let first = scheduler.submit("warm-up", || std::thread::sleep(Duration::from_millis(40))).unwrap();
    std::thread::sleep(Duration::from_millis(5));

    let observed_a = observed.clone();
    let a = scheduler.submit("a", move || observed_a.lock().unwrap_or_else(|e| e.into_inner()).push("a")).unwrap();
    let observed_b = observed.clone();
    let b = scheduler.submit("b", move || observed_b.lock().unwrap_or_else(|e| e.into_inner()).push("b")).unwrap();

    first.result(Some(Duration::from_secs(2))).unwrap();
    a.result(Some(Duration::from_secs(2))).unwrap();
    b.result(Some(Duration::from_secs(2))).unwrap();

    assert_eq!(*observed.lock().unwrap_or_else(|e| e.into_inner()), vec!["a", "b"]);
}
