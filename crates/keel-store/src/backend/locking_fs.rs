// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The locking on-disk directory backend, grounded on
//! `encore/storage/locking_filesystem_store.py`: extends
//! [`super::fs::FileSystemStore`] with a per-key [`keel_lock::FileLock`].
//! Non-transactional writes take the key's exclusive lock for the duration
//! of the call; non-transactional reads wait for the lock to be free (or
//! already ours) before reading. A transaction collects its commands
//! instead of applying them immediately; on commit, every touched key's
//! lock is acquired (sorted to give concurrent transactions a consistent
//! acquisition order and avoid deadlock), the commands replay in submission
//! order against the inner store, and every lock is released.

use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;

use keel_core::{Event, EventBus, StoreTransactionEndEvent, TransactionOutcome};
use keel_lock::FileLock;
use parking_lot::Mutex;

use super::fs::FileSystemStore;
use crate::store::{Metadata, ReadableStore, Result, Store, StoreError, StoreInfo};
use crate::transaction::TransactionContext;
use crate::value::Value;

enum Command {
    Set { key: String, data: Vec<u8>, metadata: Metadata },
    Delete { key: String },
}

#[derive(Default)]
struct PendingTransaction {
    commands: Vec<Command>,
}

pub struct LockingFileSystemStore {
    inner: FileSystemStore,
    lock_dir: PathBuf,
    poll_interval: Duration,
    timeout: Option<Duration>,
    force_timeout: Option<Duration>,
    uid: String,
    pending: Mutex<Option<PendingTransaction>>,
}

impl LockingFileSystemStore {
    pub fn new(inner: FileSystemStore, uid: impl Into<String>) -> Self {
        let lock_dir = inner.root().to_path_buf();
        Self {
            inner,
            lock_dir,
            poll_interval: Duration::from_millis(50),
            timeout: None,
            force_timeout: None,
            uid: uid.into(),
            pending: Mutex::new(None),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_force_timeout(mut self, timeout: Duration) -> Self {
        self.force_timeout = Some(timeout);
        self
    }

    fn lock_for(&self, key: &str) -> FileLock {
        let mut lock = FileLock::new(&self.lock_dir, key, self.uid.clone()).with_poll_interval(self.poll_interval);
        if let Some(timeout) = self.timeout {
            lock = lock.with_timeout(timeout);
        }
        if let Some(force_timeout) = self.force_timeout {
            lock = lock.with_force_timeout(force_timeout);
        }
        lock
    }

    fn in_transaction(&self) -> bool {
        self.pending.lock().is_some()
    }
}

impl ReadableStore for LockingFileSystemStore {
    fn connect(&self) -> Result<()> {
        self.inner.connect()
    }

    fn disconnect(&self) -> Result<()> {
        self.inner.disconnect()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn info(&self) -> StoreInfo {
        self.inner.info()
    }

    fn get(&self, key: &str) -> Result<Value> {
        let lock = self.lock_for(key);
        lock.wait()?;
        self.inner.get(key)
    }

    fn query(&self, select: Option<&[String]>, match_: &Metadata) -> Result<Vec<(String, Metadata)>> {
        self.inner.query(select, match_)
    }
}

impl Store for LockingFileSystemStore {
    fn set(&self, key: &str, data: Vec<u8>, metadata: Metadata) -> Result<()> {
        if self.in_transaction() {
            if let Some(tx) = self.pending.lock().as_mut() {
                tx.commands.push(Command::Set {
                    key: key.to_owned(),
                    data,
                    metadata,
                });
            }
            return Ok(());
        }
        let lock = self.lock_for(key);
        lock.acquire()?;
        let result = self.inner.set(key, data, metadata);
        let _ = lock.release();
        result
    }

    fn delete(&self, key: &str) -> Result<()> {
        if self.in_transaction() {
            if let Some(tx) = self.pending.lock().as_mut() {
                tx.commands.push(Command::Delete { key: key.to_owned() });
            }
            return Ok(());
        }
        let lock = self.lock_for(key);
        lock.acquire()?;
        let result = self.inner.delete(key);
        let _ = lock.release();
        result
    }

    fn transaction(&self, _notes: &str) -> Box<dyn TransactionContext + '_> {
        *self.pending.lock() = Some(PendingTransaction::default());
        self.inner.bus().emit(Event::StoreTransactionStart {
            source: self.inner.name().to_owned(),
        });
        Box::new(LockingTransaction {
            store: self,
            finished: RefCell::new(false),
        })
    }
}

struct LockingTransaction<'a> {
    store: &'a LockingFileSystemStore,
    finished: RefCell<bool>,
}

impl LockingTransaction<'_> {
    fn touched_keys(commands: &[Command]) -> Vec<String> {
        let mut keys: Vec<String> = commands
            .iter()
            .map(|c| match c {
                Command::Set { key, .. } => key.clone(),
                Command::Delete { key } => key.clone(),
            })
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    fn finish(&self, outcome: TransactionOutcome) -> Result<()> {
        if self.finished.replace(true) {
            return Ok(());
        }
        let pending = self.store.pending.lock().take().unwrap_or_default();

        let result = if outcome == TransactionOutcome::Done {
            let keys = Self::touched_keys(&pending.commands);
            let locks: Vec<FileLock> = keys.iter().map(|key| self.store.lock_for(key)).collect();
            for lock in &locks {
                lock.acquire()?;
            }
            let mut replay_result = Ok(());
            for command in pending.commands {
                let outcome = match command {
                    Command::Set { key, data, metadata } => self.store.inner.set(&key, data, metadata),
                    Command::Delete { key } => self.store.inner.delete(&key),
                };
                if let Err(e) = outcome {
                    replay_result = Err(e);
                    break;
                }
            }
            for lock in &locks {
                let _ = lock.release();
            }
            replay_result
        } else {
            Ok(())
        };

        self.store
            .inner
            .bus()
            .emit(Event::StoreTransactionEnd(StoreTransactionEndEvent {
                source: self.store.inner.name().to_owned(),
                outcome,
            }));
        result
    }
}

impl TransactionContext for LockingTransaction<'_> {
    fn commit(self: Box<Self>) -> Result<()> {
        self.finish(TransactionOutcome::Done)
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        self.finish(TransactionOutcome::Failed)
    }
}

impl Drop for LockingTransaction<'_> {
    fn drop(&mut self) {
        if !*self.finished.borrow() {
            let outcome = if std::thread::panicking() {
                TransactionOutcome::Failed
            } else {
                TransactionOutcome::Done
            };
            let _ = self.finish(outcome);
        }
    }
}

#[cfg(test)]
#[path = "locking_fs_tests.rs"]
mod tests;
