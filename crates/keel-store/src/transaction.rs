// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction Contexts (spec.md §4.G), grounded on
//! `encore/storage/utils.py`'s `DummyTransactionContext` /
//! `SimpleTransactionContext`: entering brackets a
//! `StoreTransactionStart`/`StoreTransactionEnd` pair; a store that can
//! actually roll back buffers mutation events behind a max-priority
//! interceptor listener and replays them in order on commit, discarding them
//! on rollback; a store that can't still brackets the events for coherent
//! ordering but does nothing else.
//!
//! Python's context manager supports reentrant `with store.transaction():`
//! (only the outermost enter/exit actually begins/commits); this port does
//! not model that nesting depth — a second `transaction()` call while one is
//! already open on the same store begins its own independent scope. Callers
//! that need one logical transaction should hold a single handle for its
//! entire body rather than calling `transaction()` again partway through.

use std::cell::Cell;
use std::sync::Arc;

use keel_core::{Event, EventBus, EventClass, FilterValue, Filters, StoreTransactionEndEvent, TransactionOutcome};
use parking_lot::Mutex;

use crate::store::Result;

/// A scoped transaction handle. Dropping it without calling `commit` or
/// `rollback` finishes it implicitly: normally as a commit, or as a rollback
/// if the drop happens while the thread is unwinding from a panic — the
/// Rust analogue of "exit normally" vs. "exception propagating" in the
/// Python original's `__exit__`.
pub trait TransactionContext: Send {
    fn commit(self: Box<Self>) -> Result<()>;
    fn rollback(self: Box<Self>) -> Result<()>;
}

/// Brackets start/end events around a backend with no real atomicity (the
/// in-memory and plain filesystem backends).
pub struct DummyTransaction {
    bus: EventBus,
    source: String,
    finished: Cell<bool>,
}

impl DummyTransaction {
    pub fn begin(bus: EventBus, source: impl Into<String>) -> Box<dyn TransactionContext> {
        let source = source.into();
        bus.emit(Event::StoreTransactionStart {
            source: source.clone(),
        });
        Box::new(Self {
            bus,
            source,
            finished: Cell::new(false),
        })
    }

    fn finish(&self, outcome: TransactionOutcome) -> Result<()> {
        if self.finished.replace(true) {
            return Ok(());
        }
        self.bus.emit(Event::StoreTransactionEnd(StoreTransactionEndEvent {
            source: self.source.clone(),
            outcome,
        }));
        Ok(())
    }
}

impl TransactionContext for DummyTransaction {
    fn commit(self: Box<Self>) -> Result<()> {
        self.finish(TransactionOutcome::Done)
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        self.finish(TransactionOutcome::Failed)
    }
}

impl Drop for DummyTransaction {
    fn drop(&mut self) {
        if !self.finished.get() {
            let outcome = if std::thread::panicking() {
                TransactionOutcome::Failed
            } else {
                TransactionOutcome::Done
            };
            let _ = self.finish(outcome);
        }
    }
}

/// Buffers mutation events behind a max-priority interceptor and replays
/// them on commit, for a backend whose `commit_fn`/`rollback_fn` can
/// actually undo a partially-applied transaction (sqlite's native
/// transactions; the in-memory backend's own snapshot/restore).
pub struct SimpleTransaction<'a> {
    bus: EventBus,
    source: String,
    buffered: Arc<Mutex<Vec<Event>>>,
    interceptor: Option<keel_core::ListenerId>,
    commit_fn: Option<Box<dyn FnOnce() -> Result<()> + 'a>>,
    rollback_fn: Option<Box<dyn FnOnce() -> Result<()> + 'a>>,
    finished: bool,
}

impl<'a> SimpleTransaction<'a> {
    pub fn begin(
        bus: EventBus,
        source: impl Into<String>,
        commit_fn: impl FnOnce() -> Result<()> + 'a,
        rollback_fn: impl FnOnce() -> Result<()> + 'a,
    ) -> Box<dyn TransactionContext + 'a> {
        let source = source.into();
        bus.emit(Event::StoreTransactionStart {
            source: source.clone(),
        });

        let buffered: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = buffered.clone();
        let mut filter = Filters::new();
        filter.insert("source".to_owned(), FilterValue::Str(source.clone()));
        let interceptor = bus.connect(EventClass::StoreModification, i64::MAX, filter, move |evt| {
            sink.lock().push(evt.event().clone());
            evt.mark_handled();
        });

        Box::new(Self {
            bus,
            source,
            buffered,
            interceptor: Some(interceptor),
            commit_fn: Some(Box::new(commit_fn)),
            rollback_fn: Some(Box::new(rollback_fn)),
            finished: false,
        })
    }

    fn disconnect_interceptor(&mut self) {
        if let Some(id) = self.interceptor.take() {
            self.bus.disconnect(EventClass::StoreModification, id);
        }
    }

    fn finish(&mut self, outcome: TransactionOutcome) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.disconnect_interceptor();

        let result = match outcome {
            TransactionOutcome::Done => self.commit_fn.take().map(|f| f()).unwrap_or(Ok(())),
            TransactionOutcome::Failed => self.rollback_fn.take().map(|f| f()).unwrap_or(Ok(())),
        };

        self.bus.emit(Event::StoreTransactionEnd(StoreTransactionEndEvent {
            source: self.source.clone(),
            outcome,
        }));

        if outcome == TransactionOutcome::Done {
            for event in self.buffered.lock().drain(..) {
                self.bus.emit(event);
            }
        }
        result
    }
}

impl TransactionContext for SimpleTransaction<'_> {
    fn commit(mut self: Box<Self>) -> Result<()> {
        self.finish(TransactionOutcome::Done)
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finish(TransactionOutcome::Failed)
    }
}

impl Drop for SimpleTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let outcome = if std::thread::panicking() {
                TransactionOutcome::Failed
            } else {
                TransactionOutcome::Done
            };
            let _ = self.finish(outcome);
        }
    }
}

#[cfg(test)]
#[path = "transaction_tests.rs"]
mod tests;
