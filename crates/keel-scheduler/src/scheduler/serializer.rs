// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Grounded on `encore/concurrent/futures/serializer.py`: every submission
//! runs, in submission order, one at a time.

use std::collections::VecDeque;
use std::sync::Arc;

use keel_core::KeelError;
use parking_lot::{Condvar, Mutex};

use super::{run_with_promise, QueuedJob};
use crate::future::{promise_pair, Future};
use crate::pool::Executor;

struct State {
    busy: bool,
    shutdown: bool,
    queue: VecDeque<QueuedJob>,
}

/// Runs submitted jobs one at a time, strictly in FIFO order. Nothing is
/// ever dropped: a burst of submissions just grows the queue.
pub struct Serializer {
    executor: Arc<dyn Executor>,
    state: Arc<Mutex<State>>,
    cond: Arc<Condvar>,
}

impl Serializer {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            state: Arc::new(Mutex::new(State {
                busy: false,
                shutdown: false,
                queue: VecDeque::new(),
            })),
            cond: Arc::new(Condvar::new()),
        }
    }

    /// Queue `job`, refusing with [`KeelError::AlreadyShutDown`] once
    /// `shutdown` has been called.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<Future<()>, KeelError> {
        let (promise, future) = promise_pair::<()>();
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(KeelError::AlreadyShutDown);
        }
        state.queue.push_back(QueuedJob {
            promise,
            thunk: Box::new(job),
        });
        let should_start = !state.busy;
        if should_start {
            state.busy = true;
        }
        drop(state);

        if should_start {
            drive(self.executor.clone(), self.state.clone(), self.cond.clone());
        }
        Ok(future)
    }

    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    /// Block while a job is running or queued behind one.
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while state.busy {
            self.cond.wait(&mut state);
        }
    }

    /// Refuse further submissions, then block until the queue has drained.
    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.wait();
    }
}

fn drive(executor: Arc<dyn Executor>, state: Arc<Mutex<State>>, cond: Arc<Condvar>) {
    let next = state.lock().queue.pop_front();
    match next {
        Some(job) => {
            let executor2 = executor.clone();
            let state2 = state.clone();
            let cond2 = cond.clone();
            run_with_promise(&executor, job, move || drive(executor2, state2, cond2));
        }
        None => {
            state.lock().busy = false;
            cond.notify_all();
        }
    }
}

#[cfg(test)]
#[path = "serializer_tests.rs"]
mod tests;
