// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn acquire_then_release_round_trips() {
    let dir = tempdir().unwrap();
    let lock = FileLock::new(dir.path(), "my-key", "owner-a");

    assert!(!lock.locked());
    lock.acquire().unwrap();
    assert!(lock.locked());
    assert!(lock.acquired());

    lock.release().unwrap();
    assert!(!lock.locked());
}

#[test]
fn second_owner_cannot_acquire_without_waiting() {
    let dir = tempdir().unwrap();
    let first = FileLock::new(dir.path(), "my-key", "owner-a");
    let second = FileLock::new(dir.path(), "my-key", "owner-b")
        .with_timeout(Duration::from_millis(50))
        .with_poll_interval(Duration::from_millis(5));

    first.acquire().unwrap();
    assert!(!second.acquired());
    assert!(matches!(second.acquire(), Err(FileLockError::TimedOut)));
}

#[test]
fn release_by_non_owner_fails() {
    let dir = tempdir().unwrap();
    let first = FileLock::new(dir.path(), "my-key", "owner-a");
    let second = FileLock::new(dir.path(), "my-key", "owner-b");

    first.acquire().unwrap();
    assert!(matches!(second.release(), Err(FileLockError::NotOwner)));
}

#[test]
fn force_break_clears_a_stale_lock() {
    let dir = tempdir().unwrap();
    let first = FileLock::new(dir.path(), "my-key", "owner-a");
    first.acquire().unwrap();

    let second = FileLock::new(dir.path(), "my-key", "owner-b");
    second.force_break().unwrap();
    assert!(!second.locked());
}

#[test]
fn force_timeout_lets_acquire_break_a_stale_lock() {
    let dir = tempdir().unwrap();
    let first = FileLock::new(dir.path(), "my-key", "owner-a");
    first.acquire().unwrap();

    let second = FileLock::new(dir.path(), "my-key", "owner-b")
        .with_force_timeout(Duration::from_millis(1))
        .with_poll_interval(Duration::from_millis(5));
    std::thread::sleep(Duration::from_millis(10));

    second.acquire().unwrap();
    assert!(second.acquired());
}

#[test]
fn guard_releases_on_drop() {
    let dir = tempdir().unwrap();
    let lock = FileLock::new(dir.path(), "my-key", "owner-a");
    {
        let _guard = lock.lock().unwrap();
        assert!(lock.locked());
    }
    assert!(!lock.locked());
}

#[test]
fn wait_returns_once_lock_is_released() {
    let dir = tempdir().unwrap();
    let first = FileLock::new(dir.path(), "my-key", "owner-a");
    let waiter = FileLock::new(dir.path(), "my-key", "owner-b")
        .with_poll_interval(Duration::from_millis(5));

    first.acquire().unwrap();
    let handle = std::thread::spawn(move || waiter.wait());

    std::thread::sleep(Duration::from_millis(20));
    first.release().unwrap();

    handle.join().unwrap().unwrap();
}
