// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::future::FutureError;
use crate::pool::WorkerPool;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

#[test]
fn a_second_submission_queues_behind_the_first() {
    let pool = WorkerPool::new(1, "keel-sa-test");
    let scheduler = SerializingAsynchronizer::new(Arc::new(pool));
    let count = Arc::new(AtomicU32::new(0));

    let c1 = count.clone();
    let first = scheduler
        .submit("a", move || {
            std::thread::sleep(Duration::from_millis(40));
            c1.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    std::thread::sleep(Duration::from_millis(5));
    let c2 = count.clone();
    let second = scheduler
        .submit("b", move || {
            c2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    first.result(Some(Duration::from_secs(1))).unwrap();
    second.result(Some(Duration::from_secs(1))).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn a_third_submission_under_the_same_key_replaces_the_queued_second() {
    let pool = WorkerPool::new(1, "keel-sa-test");
    let scheduler = SerializingAsynchronizer::new(Arc::new(pool));
    let ran = Arc::new(StdMutex::new(Vec::new()));

    let first = scheduler
        .submit("a", || std::thread::sleep(Duration::from_millis(40)))
        .unwrap();
    std::thread::sleep(Duration::from_millis(5));

    let ran2 = ran.clone();
    let second = scheduler.submit("b", move || ran2.lock().unwrap().push("second")).unwrap();
    let ran3 = ran.clone();
    let third = scheduler.submit("b", move || ran3.lock().unwrap().push("third")).unwrap();

    first.result(Some(Duration::from_secs(1))).unwrap();
    assert_eq!(
        second.result(Some(Duration::from_secs(1))).unwrap_err(),
        FutureError::Cancelled
    );
    third.result(Some(Duration::from_secs(1))).unwrap();

    assert_eq!(*ran.lock().unwrap(), vec!["third"]);
}

#[test]
fn distinct_keys_queued_while_busy_run_in_first_submitted_order() {
    let pool = WorkerPool::new(1, "keel-sa-test");
    let scheduler = SerializingAsynchronizer::new(Arc::new(pool));
    let ran = Arc::new(StdMutex::new(Vec::new()));

    let first = scheduler
        .submit("a", || std::thread::sleep(Duration::from_millis(40)))
        .unwrap();
    std::thread::sleep(Duration::from_millis(5));

    // "b" queues first, then "c" — a later replacement of "b" must not
    // disturb "b"'s original queue position ahead of "c".
    let ran_b = ran.clone();
    let b = scheduler.submit("b", move || ran_b.lock().unwrap().push("b")).unwrap();
    let ran_c = ran.clone();
    let c = scheduler.submit("c", move || ran_c.lock().unwrap().push("c")).unwrap();
    let ran_b2 = ran.clone();
    let b_replacement = scheduler.submit("b", move || ran_b2.lock().unwrap().push("b2")).unwrap();

    first.result(Some(Duration::from_secs(1))).unwrap();
    assert_eq!(b.result(Some(Duration::from_secs(1))).unwrap_err(), FutureError::Cancelled);
    b_replacement.result(Some(Duration::from_secs(1))).unwrap();
    c.result(Some(Duration::from_secs(1))).unwrap();

    assert_eq!(*ran.lock().unwrap(), vec!["b2", "c"]);
}

#[test]
fn submit_after_shutdown_is_refused() {
    let pool = WorkerPool::new(1, "keel-sa-test");
    let scheduler = SerializingAsynchronizer::new(Arc::new(pool));
    scheduler.shutdown();
    assert!(scheduler.submit("a", || ()).is_err());
}
