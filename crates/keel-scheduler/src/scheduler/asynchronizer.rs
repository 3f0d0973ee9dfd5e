// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Grounded on `encore/concurrent/futures/asynchronizer.py`: at most one job
//! in flight and at most one more pending behind it. A submission that
//! arrives while one is already pending replaces it — the Python original's
//! `_pending_operation` is overwritten the same way via `_schedule_new()`,
//! not dropped — so only the latest submission survives to run once the
//! in-flight job completes.

use std::sync::Arc;

use keel_core::KeelError;
use parking_lot::{Condvar, Mutex};

use super::{run_with_promise, QueuedJob};
use crate::future::{promise_pair, Future};
use crate::pool::Executor;

struct State {
    busy: bool,
    shutdown: bool,
    pending: Option<QueuedJob>,
}

pub struct Asynchronizer {
    executor: Arc<dyn Executor>,
    state: Arc<Mutex<State>>,
    cond: Arc<Condvar>,
}

impl Asynchronizer {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            state: Arc::new(Mutex::new(State {
                busy: false,
                shutdown: false,
                pending: None,
            })),
            cond: Arc::new(Condvar::new()),
        }
    }

    /// Submit a job. If one is already in flight, `job` replaces whatever
    /// was pending — only the latest submission runs once the current job
    /// finishes, and whatever it replaced resolves as cancelled. Refuses
    /// with [`KeelError::AlreadyShutDown`] once `shutdown` has been called.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<Future<()>, KeelError> {
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
            if let Some(superseded) = state.pending.replace(queued) {
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
    /// pending job have drained.
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
        let next = state2.lock().pending.take();
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
#[path = "asynchronizer_tests.rs"]
mod tests;
