// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! keel-core: error taxonomy, clock abstraction, event bus, and progress
//! reporter shared by the rest of the `keel` crates.

pub mod clock;
pub mod error;
pub mod event;
pub mod heartbeat;
pub mod progress;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::KeelError;
pub use event::{
    Emitted, Event, EventBus, EventClass, FilterValue, Filters, HeartbeatEvent, ListenerId,
    ProgressEvent, ProgressKind, StoreKeyEvent, StoreModificationKind, StoreProgressEvent,
    StoreTransactionEndEvent, TransactionOutcome,
};
pub use progress::ProgressReporter;
