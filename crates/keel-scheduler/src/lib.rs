// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! keel-scheduler: the Worker Pool and the Work Scheduler Family.

pub mod future;
pub mod pool;
pub mod scheduler;
pub mod synchronous;

pub use future::{panic_message, promise_pair, Future, FutureError, Promise};
pub use pool::{spawn, Executor, Job, WorkerPool};
pub use scheduler::{Asynchronizer, DelayedAsynchronizer, Serializer, SerializingAsynchronizer};
pub use synchronous::SynchronousExecutor;
