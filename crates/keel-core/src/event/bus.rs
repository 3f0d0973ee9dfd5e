// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::kinds::{Event, EventClass, Filters};

/// A handle returned from `connect`/`connect_weak`, used to `disconnect`
/// later. Opaque by design: unlike the Python original there is no bound
/// method to hash for identity, so callers hold onto the handle instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The event as seen by a listener during dispatch, plus the "has anyone
/// handled this yet" flag from `BaseEvent.mark_as_handled`/`_handled`.
/// Dispatch stops calling further listeners once a listener marks the event
/// handled.
pub struct Emitted<'a> {
    event: &'a Event,
    handled: Cell<bool>,
}

impl<'a> Emitted<'a> {
    fn new(event: &'a Event) -> Self {
        Self {
            event,
            handled: Cell::new(false),
        }
    }

    pub fn event(&self) -> &Event {
        self.event
    }

    pub fn mark_handled(&self) {
        self.handled.set(true);
    }

    pub fn is_handled(&self) -> bool {
        self.handled.get()
    }
}

/// Returns `false` once the listener should be pruned (its weak receiver is
/// gone).
type Callback = Arc<dyn Fn(&Emitted<'_>) -> bool + Send + Sync>;

struct Registration {
    id: ListenerId,
    priority: i64,
    seq: u64,
    filter: Filters,
    callback: Callback,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    next_seq: u64,
    by_class: HashMap<EventClass, Vec<Registration>>,
    disabled: HashSet<EventClass>,
}

impl Inner {
    fn insert(
        &mut self,
        class: EventClass,
        priority: i64,
        filter: Filters,
        callback: Callback,
    ) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.next_seq += 1;
        let seq = self.next_seq;
        let list = self.by_class.entry(class).or_default();
        let reg = Registration {
            id,
            priority,
            seq,
            filter,
            callback,
        };
        // Insertion-sorted by (priority desc, seq asc), mirroring
        // `bisect.insort_left` over `(-priority, count)` in
        // `abstract_event_manager.py`.
        let pos = list
            .iter()
            .position(|existing| (existing.priority, existing.seq) > (reg.priority, reg.seq))
            .unwrap_or(list.len());
        list.insert(pos, reg);
        id
    }
}

/// The Event Bus: priority-ordered, filterable, hierarchical pub/sub.
///
/// Cloning an `EventBus` yields another handle to the same underlying
/// registry (it is reference-counted internally), matching the Python
/// original's singleton-per-process `EventManager`.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Inner>>,
    operation_ids: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id for a progress operation, shared across the
    /// whole bus so nested/concurrent operations never collide.
    pub fn next_operation_id(&self) -> u64 {
        self.operation_ids.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a listener for `class` (and, implicitly, every class whose
    /// hierarchy includes it). Returns a handle for `disconnect`.
    pub fn connect(
        &self,
        class: EventClass,
        priority: i64,
        filter: Filters,
        listener: impl Fn(&Emitted<'_>) + Send + Sync + 'static,
    ) -> ListenerId {
        let callback: Callback = Arc::new(move |evt| {
            listener(evt);
            true
        });
        self.inner.lock().insert(class, priority, filter, callback)
    }

    /// Register a listener bound weakly to `receiver`: once `receiver` has
    /// no other strong references, the listener stops firing and is pruned
    /// on the next dispatch. Mirrors `MethodNotifier`'s weakref-based bound
    /// method identity in `event_manager.py`.
    pub fn connect_weak<T: Send + Sync + 'static>(
        &self,
        class: EventClass,
        receiver: &Arc<T>,
        priority: i64,
        filter: Filters,
        listener: impl Fn(&T, &Emitted<'_>) + Send + Sync + 'static,
    ) -> ListenerId {
        let weak = Arc::downgrade(receiver);
        let callback: Callback = Arc::new(move |evt| match weak.upgrade() {
            Some(strong) => {
                listener(&strong, evt);
                true
            }
            None => false,
        });
        self.inner.lock().insert(class, priority, filter, callback)
    }

    pub fn disconnect(&self, class: EventClass, id: ListenerId) {
        if let Some(list) = self.inner.lock().by_class.get_mut(&class) {
            list.retain(|reg| reg.id != id);
        }
    }

    pub fn disable(&self, class: EventClass) {
        self.inner.lock().disabled.insert(class);
    }

    pub fn enable(&self, class: EventClass) {
        self.inner.lock().disabled.remove(&class);
    }

    /// Whether `class` (or any ancestor) is currently disabled — walking
    /// the hierarchy the way `is_enabled` walks `get_event_hierarchy` in the
    /// Python original.
    pub fn is_enabled(&self, class: EventClass) -> bool {
        let inner = self.inner.lock();
        !class.ancestors().iter().any(|c| inner.disabled.contains(c))
    }

    /// Emit an event, dispatching synchronously on the calling thread.
    /// `EventBus` itself doesn't decide blocking vs. non-blocking; callers
    /// that want `encore`'s non-blocking emit spawn their own thread calling
    /// `emit` on a cloned bus, since `EventBus` is `Clone + Send + Sync`.
    pub fn emit(&self, event: Event) {
        let class = event.class();
        if !self.is_enabled(class) {
            tracing::debug!(?class, "event class disabled, skipping emit");
            return;
        }

        // Gather every (class, registration) pair visible to this event,
        // pre-filtering by the listener's own filter so dead weak
        // registrations and non-matching filters never get a call.
        let candidates: Vec<(EventClass, ListenerId, i64, u64, Callback)> = {
            let inner = self.inner.lock();
            let mut candidates = Vec::new();
            for ancestor in class.ancestors() {
                if let Some(list) = inner.by_class.get(ancestor) {
                    for reg in list {
                        if event.matches(&reg.filter) {
                            candidates.push((*ancestor, reg.id, reg.priority, reg.seq, reg.callback.clone()));
                        }
                    }
                }
            }
            candidates
        };

        let mut ordered = candidates;
        ordered.sort_by(|a, b| (b.2, a.3).cmp(&(a.2, b.3)));

        let emitted = Emitted::new(&event);
        let mut dead: Vec<(EventClass, ListenerId)> = Vec::new();
        for (ancestor, id, _, _, callback) in &ordered {
            let alive = catch_unwind(AssertUnwindSafe(|| callback(&emitted))).unwrap_or_else(|_| {
                tracing::error!(?class, "event listener panicked");
                true
            });
            if !alive {
                dead.push((*ancestor, *id));
                continue;
            }
            if emitted.is_handled() {
                break;
            }
        }
        tracing::debug!(?class, source = event.source(), "event dispatched");

        if !dead.is_empty() {
            let mut inner = self.inner.lock();
            for (ancestor, id) in dead {
                if let Some(list) = inner.by_class.get_mut(&ancestor) {
                    list.retain(|reg| reg.id != id);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
