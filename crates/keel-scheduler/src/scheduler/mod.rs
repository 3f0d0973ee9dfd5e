// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Work Scheduler Family (spec.md §4.C): four policies for turning a
//! stream of job submissions into a bounded amount of concurrent work,
//! grounded on `encore/concurrent/futures/{abc_work_scheduler,serializer,
//! asynchronizer,serializing_asynchronizer,delayed_asynchronizer}.py`.
//!
//! All four share one primitive — [`run_with_promise`] runs exactly one job
//! at a time and calls back into the policy once it finishes — and differ
//! only in what happens to a submission that arrives while a job is already
//! in flight:
//!
//! - [`Serializer`]: queue it; run every submission, strictly in order.
//! - [`Asynchronizer`]: replace whatever single job was already pending
//!   with it; at most one waits behind the in-flight job, and only the
//!   latest submission survives to run.
//! - [`SerializingAsynchronizer`]: same single-pending-slot-behind-the-job
//!   policy, but keyed per callable identity — a repeat key replaces the
//!   job waiting under that key in place, while distinct keys each get
//!   their own slot and run in the order they were first submitted.
//! - [`DelayedAsynchronizer`]: same as `Asynchronizer`, but waits a fixed
//!   delay after the in-flight job finishes before starting the next one,
//!   coalescing a burst of submissions into a single run.

mod asynchronizer;
mod delayed_asynchronizer;
mod serializer;
mod serializing_asynchronizer;

pub use asynchronizer::Asynchronizer;
pub use delayed_asynchronizer::DelayedAsynchronizer;
pub use serializer::Serializer;
pub use serializing_asynchronizer::SerializingAsynchronizer;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::future::{panic_message, Promise};
use crate::pool::{Executor, Job};

/// A job paired with the promise that will carry its result, queued up
/// before it's known which executor call will actually run it.
pub(crate) struct QueuedJob {
    pub promise: Promise<()>,
    pub thunk: Job,
}

/// Run one queued job on `executor`, resolving its promise and then calling
/// `on_done` — from whatever thread the executor ran the job on — once it
/// finishes, successfully, with a panic, or not at all.
pub(crate) fn run_with_promise(
    executor: &Arc<dyn Executor>,
    job: QueuedJob,
    on_done: impl FnOnce() + Send + 'static,
) {
    let QueuedJob { promise, thunk } = job;
    let wrapped: Job = Box::new(move || {
        promise.set_running();
        match catch_unwind(AssertUnwindSafe(thunk)) {
            Ok(()) => promise.set_result(()),
            Err(payload) => promise.set_exception(panic_message(payload)),
        }
        on_done();
    });
    executor.execute(wrapped);
}
