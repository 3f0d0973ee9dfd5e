// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Worker Pool (spec.md §4.B), grounded on
//! `encore/concurrent/futures/enhanced_thread_pool_executor.py`: a bounded
//! pool of named worker threads pulling jobs off a shared queue.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread::JoinHandle;

use keel_core::KeelError;
use parking_lot::Mutex;

use crate::future::{panic_message, promise_pair, Future};

pub type Job = Box<dyn FnOnce() + Send>;

/// Something that can run a boxed job, somewhere, eventually. The scheduler
/// family (`Serializer` and friends) is generic over this trait so their
/// own unit tests can run against a same-thread
/// [`crate::synchronous::SynchronousExecutor`] instead of a real pool.
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

/// Submit `f` to `executor`, returning a [`Future`] for its result. Captures
/// a panic inside `f` as a failed future rather than unwinding the worker
/// thread, matching `Future`'s captured-traceback contract in the Python
/// original.
pub fn spawn<T: Send + 'static>(
    executor: &dyn Executor,
    f: impl FnOnce() -> T + Send + 'static,
) -> Future<T> {
    let (promise, future) = promise_pair::<T>();
    let job: Job = Box::new(move || {
        promise.set_running();
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => promise.set_result(value),
            Err(payload) => promise.set_exception(panic_message(payload)),
        }
    });
    executor.execute(job);
    future
}

/// A bounded pool of named threads (`"{prefix}-{n}"`), each pulling jobs off
/// a shared FIFO queue until the pool is shut down.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

impl WorkerPool {
    pub fn new(size: usize, thread_name_prefix: &str) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(StdMutex::new(receiver));
        let mut workers = Vec::with_capacity(size);

        for n in 0..size {
            let receiver = receiver.clone();
            let name = format!("{thread_name_prefix}-{n}");
            let spawned = std::thread::Builder::new().name(name.clone()).spawn(move || loop {
                let job = {
                    let receiver = match receiver.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    receiver.recv()
                };
                match job {
                    Ok(job) => job(),
                    Err(_) => break,
                }
            });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => tracing::error!(thread = %name, error = %e, "failed to spawn worker thread"),
            }
        }

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Submit a job, returning its `Future`. Refuses with
    /// [`KeelError::AlreadyShutDown`] once `shutdown` has been called.
    pub fn submit<T: Send + 'static>(
        &self,
        f: impl FnOnce() -> T + Send + 'static,
    ) -> Result<Future<T>, KeelError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(KeelError::AlreadyShutDown);
        }
        Ok(spawn(self, f))
    }

    /// Stop accepting new jobs. If `wait` is true, block until every worker
    /// thread has drained the queue and exited.
    pub fn shutdown(&self, wait: bool) {
        self.shutdown.store(true, Ordering::Release);
        self.sender.lock().take();
        if wait {
            for handle in self.workers.lock().drain(..) {
                let _ = handle.join();
            }
        }
    }
}

impl Executor for WorkerPool {
    fn execute(&self, job: Job) {
        match &*self.sender.lock() {
            Some(sender) => {
                if sender.send(job).is_err() {
                    tracing::warn!("worker pool queue closed, dropping job");
                }
            }
            None => tracing::warn!("worker pool already shut down, dropping job"),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown(true);
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
