// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Grounded on `encore/concurrent/futures/delayed_asynchronizer.py`: the
//! same single-in-flight-plus-one-pending policy as
//! [`super::Asynchronizer`], but after the in-flight job finishes, the next
//! pending job doesn't start immediately — it waits out a fixed delay
//! first, so a burst of submissions during that window keeps coalescing
//! into one run instead of each triggering its own.

use std::sync::Arc;
use std::time::Duration;

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

pub struct DelayedAsynchronizer {
    executor: Arc<dyn Executor>,
    state: Arc<Mutex<State>>,
    cond: Arc<Condvar>,
    delay: Duration,
}

impl DelayedAsynchronizer {
    pub fn new(executor: Arc<dyn Executor>, delay: Duration) -> Self {
        Self {
            executor,
            state: Arc::new(Mutex::new(State {
                busy: false,
                shutdown: false,
                pending: None,
            })),
            cond: Arc::new(Condvar::new()),
            delay,
        }
    }

    /// Submit a job. If one is already in flight, `job` replaces whatever
    /// was pending — only the latest submission survives to run, after the
    /// coalescing delay, once the current job finishes. Refuses with
    /// [`KeelError::AlreadyShutDown`] once `shutdown` has been called.
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

        drive(self.executor.clone(), self.state.clone(), self.cond.clone(), self.delay, queued);
        Ok(future)
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    /// Block while a job is running, waiting out its coalescing delay, or
    /// pending behind one.
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while state.busy {
            self.cond.wait(&mut state);
        }
    }

    /// Refuse further submissions, then block until the in-flight and
    /// pending job (and its coalescing delay) have drained.
    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.wait();
    }
}

fn drive(
    executor: Arc<dyn Executor>,
    state: Arc<Mutex<State>>,
    cond: Arc<Condvar>,
    delay: Duration,
    job: QueuedJob,
) {
    let executor2 = executor.clone();
    let state2 = state.clone();
    let cond2 = cond.clone();
    run_with_promise(&executor, job, move || {
        // Wait out the coalescing window on its own thread rather than
        // blocking the executor's worker; only after the delay do we check
        // for (and run) whatever's been pending in the meantime.
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            let next = state2.lock().pending.take();
            match next {
                Some(next_job) => drive(executor2, state2, cond2, delay, next_job),
                None => {
                    state2.lock().busy = false;
                    cond2.notify_all();
                }
            }
        });
    });
}

#[cfg(test)]
#[path = "delayed_asynchronizer_tests.rs"]
mod tests;
