// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Grounded on `encore/concurrent/futures/serializing_asynchronizer.py`: at
//! most one job in flight, and at most one more pending behind it per
//! callable key. Submissions are keyed by callable identity (an `OrderedDict`
//! keyed by `operation` in the Python original); resubmitting under a key
//! that's already pending replaces that entry in place, at its original
//! position, while distinct keys each queue separately and run in the order
//! they were first submitted.

use std::sync::Arc;

use indexmap::IndexMap;
use keel_core::KeelError;
use parking_lot::{Condvar, Mutex};

use super::{run_with_promise, QueuedJob};
use crate::future::{promise_pair, Future};
use crate::pool::Executor;

struct State {
    busy: bool,
    shutdown: bool,
    pending: IndexMap<String, QueuedJob>,
}

pub struct SerializingAsynchronizer {
    executor: Arc<dyn Executor>,
    state: Arc<Mutex<State>>,
    cond: Arc<Condvar>,
}

impl SerializingAsynchronizer {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            state: Arc::new(Mutex::new(State {
                busy: false,
                shutdown: false,
                pending: IndexMap::new(),
            })),
            cond: Arc::new(Condvar::new()),
        }
    }

    /// Submit a job under `key`. If one is already in flight, `job` is held
    /// pending under `key` — replacing, in place, whatever was already
    /// pending under that same key, or queuing behind distinct keys in the
    /// order they first appeared. Refuses with
    /// [`KeelError::AlreadyShutDown`] once `shutdown` has been called.
    pub fn submit(
        &self,
        key: impl Into<String>,
        job: impl FnOnce() + Send + 'static,
    ) -> Result<Future<()>, KeelError> {
        let (promise, future) = promise_pair::<()>();
        let queued = QueuedJob {
            promise,
            thunk: Box::new(job),
        };

        let mut state = self.state.lock();
        if state.shutdown {
            return Err(KeelError::AlreadyShutDown);
        }
        if state.busy {
            if let Some(superseded) = state.pending.insert(key.into(), queued) {
                superseded.promise.cancel();
            }
            return Ok(future);
        }
        state.busy = true;
        drop(state);

        drive(self.executor.clone(), self.state.clone(), self.cond.clone(), queued);
        Ok(future)
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    /// Block while a job is running or one is pending behind it.
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while state.busy {
            self.cond.wait(&mut state);
        }
    }

    /// Refuse further submissions, then block until the in-flight and
    /// pending jobs have drained.
    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.wait();
    }
}

fn drive(executor: Arc<dyn Executor>, state: Arc<Mutex<State>>, cond: Arc<Condvar>, job: QueuedJob) {
    let executor2 = executor.clone();
    let state2 = state.clone();
    let cond2 = cond.clone();
    run_with_promise(&executor, job, move || {
        let next = state2.lock().pending.shift_remove_index(0).map(|(_, job)| job);
        match next {
            Some(next_job) => drive(executor2, state2, cond2, next_job),
            None => {
                state2.lock().busy = false;
                cond2.notify_all();
            }
        }
    });
}

#[cfg(test)]
#[path = "serializing_asynchronizer_tests.rs"]
mod tests;
