// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Event Bus (spec.md §4.A): a typed publish/subscribe mechanism with
//! priority-ordered listeners, hierarchical event classes that can be
//! enabled/disabled as a group, and listeners that can be bound weakly to a
//! receiver so they stop firing once the receiver is dropped.
//!
//! Grounded on `encore/events/abstract_event_manager.py` and
//! `encore/events/event_manager.py`: `EventManager.emit` walks the event's
//! class hierarchy, merges each class's priority-sorted listener list, and
//! dispatches in priority order until a listener marks the event handled.

mod bus;
mod kinds;

pub use bus::{Emitted, EventBus, ListenerId};
pub use kinds::{
    Event, EventClass, FilterValue, Filters, HeartbeatEvent, ProgressEvent, ProgressKind,
    StoreKeyEvent, StoreModificationKind, StoreProgressEvent, StoreTransactionEndEvent,
    TransactionOutcome,
};
