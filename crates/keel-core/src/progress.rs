// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Progress Reporter (spec.md §4.H), grounded on
//! `encore/events/progress_events.py::ProgressManager`: a start/step/end
//! triple of events for a single logical operation, with a callable
//! shorthand that auto-starts on first use and a scoped form that always
//! emits an end event when dropped.

use crate::error::{KeelError, Result};
use crate::event::{Event, EventBus, ProgressEvent, ProgressKind, StoreProgressEvent};

/// Reports start/step/end events for one operation, optionally scoped to a
/// store key (`for_key`), in which case it emits `StoreProgress*` events
/// instead of bare `Progress*` events — the split `encore/storage/
/// utils.py::StoreProgressManager` makes by subclassing with different
/// event types.
pub struct ProgressReporter {
    bus: EventBus,
    source: String,
    key: Option<String>,
    operation_id: u64,
    total: Option<u64>,
    started: bool,
    ended: bool,
}

impl ProgressReporter {
    pub fn new(bus: EventBus, source: impl Into<String>) -> Self {
        let operation_id = bus.next_operation_id();
        Self {
            bus,
            source: source.into(),
            key: None,
            operation_id,
            total: None,
            started: false,
            ended: false,
        }
    }

    pub fn for_key(bus: EventBus, source: impl Into<String>, key: impl Into<String>) -> Self {
        let mut reporter = Self::new(bus, source);
        reporter.key = Some(key.into());
        reporter
    }

    fn emit(&self, kind: ProgressKind, message: String, step: Option<u64>) {
        let event = match &self.key {
            Some(key) => Event::StoreProgress(StoreProgressEvent {
                source: self.source.clone(),
                key: key.clone(),
                operation_id: self.operation_id,
                message,
                kind,
                step,
                total: self.total,
            }),
            None => Event::Progress(ProgressEvent {
                source: self.source.clone(),
                operation_id: self.operation_id,
                message,
                kind,
                step,
                total: self.total,
            }),
        };
        self.bus.emit(event);
    }

    /// Begin the operation. Idempotent: calling `start` again just restarts
    /// the message/total shown, matching the Python original's willingness
    /// to call `start` more than once.
    pub fn start(&mut self, message: impl Into<String>, total: Option<u64>) {
        self.total = total;
        self.started = true;
        self.ended = false;
        self.emit(ProgressKind::Start, message.into(), None);
    }

    pub fn step(&mut self, step: u64, message: impl Into<String>) -> Result<()> {
        if !self.started {
            return Err(KeelError::NotStarted);
        }
        self.emit(ProgressKind::Step, message.into(), Some(step));
        Ok(())
    }

    pub fn end(&mut self, message: impl Into<String>) -> Result<()> {
        if !self.started {
            return Err(KeelError::NotStarted);
        }
        self.ended = true;
        self.emit(ProgressKind::End, message.into(), None);
        Ok(())
    }

    /// The `ProgressManager.__call__` shorthand: auto-starts on first call
    /// (with `message` as both the start and step message), then steps on
    /// every subsequent call.
    pub fn call(&mut self, step: u64, message: impl Into<String>) {
        let message = message.into();
        if !self.started {
            self.start(message.clone(), self.total);
        }
        let _ = self.step(step, message);
    }

    pub fn operation_id(&self) -> u64 {
        self.operation_id
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if self.started && !self.ended {
            let message = if std::thread::panicking() {
                "exception"
            } else {
                "normal"
            };
            self.emit(ProgressKind::End, message.to_owned(), None);
        }
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
