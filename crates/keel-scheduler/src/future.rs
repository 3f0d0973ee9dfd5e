// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Worker Pool's `Future`/`Promise` pair (spec.md §4.B), grounded on
//! `encore/concurrent/futures/future.py`: a handle for a job's eventual
//! result, including the failure message captured from a panic in place of
//! Python's captured traceback.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FutureError {
    #[error("job failed: {0}")]
    Failed(String),

    #[error("timed out waiting for result")]
    TimedOut,

    #[error("job was superseded before it ran")]
    Cancelled,
}

enum State<T> {
    Pending,
    Running,
    Done(T),
    Failed(String),
    Cancelled,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    cond: Condvar,
}

/// The receiving half of a job result.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// The producing half of a job result, held by whichever executor actually
/// runs the job.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

pub fn promise_pair<T>() -> (Promise<T>, Future<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::Pending),
        cond: Condvar::new(),
    });
    (
        Promise {
            shared: shared.clone(),
        },
        Future { shared },
    )
}

impl<T: Clone> Future<T> {
    /// Block for the job's result. `timeout` of `None` waits indefinitely,
    /// matching `Future.result(timeout=None)` in the Python original.
    pub fn result(&self, timeout: Option<Duration>) -> Result<T, FutureError> {
        let mut guard = self.shared.state.lock();
        loop {
            match &*guard {
                State::Done(value) => return Ok(value.clone()),
                State::Failed(message) => return Err(FutureError::Failed(message.clone())),
                State::Cancelled => return Err(FutureError::Cancelled),
                State::Pending | State::Running => {}
            }
            match timeout {
                Some(duration) => {
                    let result = self.shared.cond.wait_for(&mut guard, duration);
                    if result.timed_out() {
                        return Err(FutureError::TimedOut);
                    }
                }
                None => self.shared.cond.wait(&mut guard),
            }
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(
            &*self.shared.state.lock(),
            State::Done(_) | State::Failed(_) | State::Cancelled
        )
    }
}

impl<T> Promise<T> {
    pub fn set_running(&self) {
        *self.shared.state.lock() = State::Running;
    }

    pub fn set_result(&self, value: T) {
        *self.shared.state.lock() = State::Done(value);
        self.shared.cond.notify_all();
    }

    pub fn set_exception(&self, message: String) {
        *self.shared.state.lock() = State::Failed(message);
        self.shared.cond.notify_all();
    }

    /// Mark the job cancelled without ever running it — used by the
    /// scheduler family's coalescing policies when a queued job is replaced
    /// by a newer submission before it got a chance to run.
    pub fn cancel(&self) {
        *self.shared.state.lock() = State::Cancelled;
        self.shared.cond.notify_all();
    }
}

/// Recover a readable message from a `catch_unwind` panic payload, standing
/// in for the traceback `Future.exception` captures in the Python original.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "job panicked with a non-string payload".to_owned()
    }
}

#[cfg(test)]
#[path = "future_tests.rs"]
mod tests;
