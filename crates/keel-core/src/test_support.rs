// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test-only helpers shared by this crate's own tests and, via the
//! `test-support` feature, by `keel-lock`/`keel-scheduler`/`keel-store`'s
//! tests. Mirrors `oj-core`'s own `test_support` module.

use std::sync::{Arc, Mutex};

use crate::event::{Emitted, Event, EventBus, EventClass, Filters};

/// Records every event of a given class (and its descendants) emitted on a
/// bus, for assertions like "exactly one `StoreSetEvent` was emitted".
pub struct EventRecorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventRecorder {
    pub fn attach(bus: &EventBus, class: EventClass) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        bus.connect(class, i64::MIN, Filters::new(), move |evt: &Emitted<'_>| {
            sink.lock().unwrap_or_else(|e| e.into_inner()).push(evt.event().clone());
        });
        Self { events }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
