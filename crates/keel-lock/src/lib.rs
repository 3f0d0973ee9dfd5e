// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The File Lock (spec.md §4.D): a cross-process advisory lock built on
//! atomic file creation (`O_CREAT | O_EXCL`), grounded on
//! `encore/storage/file_lock.py`.
//!
//! The lock file's contents identify the owner (`host\npid\nuser\nuid\nLOCK`)
//! so that `release`/`acquired` can tell whether the caller actually holds
//! the lock or is looking at someone else's.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use thiserror::Error;

/// The error taxonomy for `FileLock`, collapsing spec.md's distilled
/// `LockError` into the concrete cases `encore`'s `LockError` actually
/// raises.
#[derive(Debug, Error)]
pub enum FileLockError {
    #[error("lock is already held by another owner")]
    AlreadyLocked,

    #[error("lock is not held by this owner")]
    NotOwner,

    #[error("timed out waiting for lock")]
    TimedOut,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FileLockError> for keel_core::KeelError {
    fn from(value: FileLockError) -> Self {
        match value {
            FileLockError::AlreadyLocked => keel_core::KeelError::TimedOut,
            FileLockError::NotOwner => keel_core::KeelError::NotOwner,
            FileLockError::TimedOut => keel_core::KeelError::TimedOut,
            FileLockError::Io(e) => keel_core::KeelError::BackendFailure(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, FileLockError>;

/// An advisory, cross-process file lock.
///
/// `uid` distinguishes different `FileLock` instances within the same
/// process that should be treated as the *same* owner (e.g. every lock a
/// given store instance takes uses that store's own uid), matching
/// `id(self)` in the Python original.
pub struct FileLock {
    full_path: PathBuf,
    poll_interval: Duration,
    timeout: Option<Duration>,
    force_timeout: Option<Duration>,
    uid: String,
}

impl FileLock {
    pub fn new(dir: impl AsRef<Path>, name: impl AsRef<str>, uid: impl Into<String>) -> Self {
        let full_path = dir.as_ref().join(format!("{}.lock", name.as_ref()));
        Self {
            full_path,
            poll_interval: Duration::from_millis(100),
            timeout: None,
            force_timeout: None,
            uid: uid.into(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_force_timeout(mut self, timeout: Duration) -> Self {
        self.force_timeout = Some(timeout);
        self
    }

    fn identity(&self) -> String {
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_owned());
        let pid = std::process::id();
        let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_owned());
        format!("{host}\n{pid}\n{user}\n{}\nLOCK", self.uid)
    }

    /// Try to create the lock file exactly once, succeeding only if it did
    /// not already exist.
    fn try_create(&self) -> std::io::Result<()> {
        let mut file: File = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.full_path)?;
        file.write_all(self.identity().as_bytes())?;
        Ok(())
    }

    fn age(&self) -> Option<Duration> {
        let metadata = fs::metadata(&self.full_path).ok()?;
        let modified = metadata.modified().ok()?;
        SystemTime::now().duration_since(modified).ok()
    }

    /// Acquire the lock, blocking until it is available, `timeout` elapses,
    /// or (if `force_timeout` is set) a stale lock is forcibly broken.
    pub fn acquire(&self) -> Result<()> {
        let start = Instant::now();
        loop {
            match self.try_create() {
                Ok(()) => {
                    tracing::debug!(path = %self.full_path.display(), "lock acquired");
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if let (Some(force_timeout), Some(age)) = (self.force_timeout, self.age()) {
                        if age >= force_timeout {
                            tracing::warn!(path = %self.full_path.display(), "forcing stale lock");
                            self.force_break()?;
                            continue;
                        }
                    }
                    if let Some(timeout) = self.timeout {
                        if start.elapsed() >= timeout {
                            return Err(FileLockError::TimedOut);
                        }
                    }
                    std::thread::sleep(self.poll_interval);
                }
                Err(e) => return Err(FileLockError::Io(e)),
            }
        }
    }

    fn read_contents(&self) -> std::io::Result<String> {
        let mut contents = String::new();
        File::open(&self.full_path)?.read_to_string(&mut contents)?;
        Ok(contents)
    }

    /// Release the lock. Fails with `NotOwner` if the lock file's contents
    /// don't match this instance's identity (someone else holds it, or it
    /// was never acquired).
    pub fn release(&self) -> Result<()> {
        let contents = match self.read_contents() {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(FileLockError::NotOwner),
            Err(e) => return Err(FileLockError::Io(e)),
        };
        if contents != self.identity() {
            return Err(FileLockError::NotOwner);
        }
        fs::remove_file(&self.full_path)?;
        tracing::debug!(path = %self.full_path.display(), "lock released");
        Ok(())
    }

    /// Whether the lock file exists at all, regardless of owner.
    pub fn locked(&self) -> bool {
        self.full_path.exists()
    }

    /// Whether this instance currently holds the lock.
    pub fn acquired(&self) -> bool {
        self.read_contents()
            .map(|contents| contents == self.identity())
            .unwrap_or(false)
    }

    /// Unconditionally remove the lock file, regardless of owner.
    pub fn force_break(&self) -> Result<()> {
        match fs::remove_file(&self.full_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FileLockError::Io(e)),
        }
    }

    /// Block until the lock is free (or already held by this instance),
    /// optionally force-breaking a stale lock along the way.
    pub fn wait(&self) -> Result<()> {
        let start = Instant::now();
        while self.locked() && !self.acquired() {
            if let (Some(force_timeout), Some(age)) = (self.force_timeout, self.age()) {
                if age >= force_timeout {
                    self.force_break()?;
                    return Ok(());
                }
            }
            if let Some(timeout) = self.timeout {
                if start.elapsed() >= timeout {
                    return Err(FileLockError::TimedOut);
                }
            }
            std::thread::sleep(self.poll_interval);
        }
        Ok(())
    }

    /// Acquire the lock and return a guard that releases it on drop,
    /// matching `FileLock.__enter__`/`__exit__`.
    pub fn lock(&self) -> Result<FileLockGuard<'_>> {
        self.acquire()?;
        Ok(FileLockGuard { lock: self })
    }
}

/// An RAII guard releasing its `FileLock` when dropped. A failed release on
/// drop is logged, not panicked — `Drop` cannot return a `Result`.
pub struct FileLockGuard<'a> {
    lock: &'a FileLock,
}

impl Drop for FileLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release() {
            tracing::warn!(error = %e, "failed to release lock on drop");
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
