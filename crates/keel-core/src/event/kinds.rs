// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed event taxonomy. Python's `encore` builds this hierarchy with
//! ordinary class inheritance (`StoreProgressEvent(ProgressEvent,
//! StoreKeyEvent)`) and walks `__mro__` at dispatch time; we instead give
//! every concrete event a fixed [`EventClass`] tag and list its ancestors
//! explicitly, per Design Notes §9 ("abstract-base-classes with metaclass
//! registration").

use std::collections::HashMap;

/// A tag identifying one class in the event hierarchy. Listeners subscribe
/// to a tag; an emitted event is visible to listeners on its own tag and
/// every ancestor tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    Base,
    Store,
    StoreKey,
    StoreModification,
    StoreSet,
    StoreUpdate,
    StoreDelete,
    StoreTransactionStart,
    StoreTransactionEnd,
    Progress,
    ProgressStart,
    ProgressStep,
    ProgressEnd,
    StoreProgress,
    StoreProgressStart,
    StoreProgressStep,
    StoreProgressEnd,
    Heartbeat,
}

impl EventClass {
    /// The class itself followed by every ancestor, most specific first.
    /// Duplicates are harmless: the bus merges listener lists into a single
    /// priority-ordered run and dedupes by listener identity.
    pub fn ancestors(self) -> &'static [EventClass] {
        use EventClass::*;
        match self {
            Base => &[Base],
            Store => &[Store, Base],
            StoreKey => &[StoreKey, Store, Base],
            StoreModification => &[StoreModification, StoreKey, Store, Base],
            StoreSet => &[StoreSet, StoreModification, StoreKey, Store, Base],
            StoreUpdate => &[StoreUpdate, StoreModification, StoreKey, Store, Base],
            StoreDelete => &[StoreDelete, StoreModification, StoreKey, Store, Base],
            StoreTransactionStart => &[StoreTransactionStart, Store, Base],
            StoreTransactionEnd => &[StoreTransactionEnd, Store, Base],
            Progress => &[Progress, Base],
            ProgressStart => &[ProgressStart, Progress, Base],
            ProgressStep => &[ProgressStep, Progress, Base],
            ProgressEnd => &[ProgressEnd, Progress, Base],
            StoreProgress => &[StoreProgress, Progress, StoreKey, Store, Base],
            StoreProgressStart => &[
                StoreProgressStart,
                StoreProgress,
                ProgressStart,
                Progress,
                StoreKey,
                Store,
                Base,
            ],
            StoreProgressStep => &[
                StoreProgressStep,
                StoreProgress,
                ProgressStep,
                Progress,
                StoreKey,
                Store,
                Base,
            ],
            StoreProgressEnd => &[
                StoreProgressEnd,
                StoreProgress,
                ProgressEnd,
                Progress,
                StoreKey,
                Store,
                Base,
            ],
            Heartbeat => &[Heartbeat, Base],
        }
    }
}

/// A single filter value, compared for equality against a field pulled off
/// an emitted event by name. Mirrors the keyword-argument filters
/// `EventManager.connect` accepts in the Python original.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Str(String),
    U64(u64),
    Bool(bool),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Str(value.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Str(value)
    }
}

impl From<u64> for FilterValue {
    fn from(value: u64) -> Self {
        FilterValue::U64(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

/// Listener filters, keyed by dotted field path (e.g. `"key"`, `"state"`).
/// A listener only fires when every entry matches the event.
pub type Filters = HashMap<String, FilterValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreModificationKind {
    Set,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Start,
    Step,
    End,
}

/// A modification (set/update/delete) against a single key.
#[derive(Debug, Clone)]
pub struct StoreKeyEvent {
    pub source: String,
    pub key: String,
    pub kind: StoreModificationKind,
}

#[derive(Debug, Clone)]
pub struct StoreTransactionEndEvent {
    pub source: String,
    pub outcome: TransactionOutcome,
}

/// A bare progress notification, not tied to a store key.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub source: String,
    pub operation_id: u64,
    pub message: String,
    pub kind: ProgressKind,
    pub step: Option<u64>,
    pub total: Option<u64>,
}

/// A progress notification for a streaming store operation against a key
/// (`to_file`/`from_file`/`to_bytes`/`from_bytes`), combining the
/// `ProgressEvent` and `StoreKeyEvent` axes the way
/// `encore/storage/events.py::StoreProgressEvent` does via multiple
/// inheritance.
#[derive(Debug, Clone)]
pub struct StoreProgressEvent {
    pub source: String,
    pub key: String,
    pub operation_id: u64,
    pub message: String,
    pub kind: ProgressKind,
    pub step: Option<u64>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct HeartbeatEvent {
    pub source: String,
    pub epoch_ms: u64,
    pub frame: u64,
    pub interval_ms: u64,
}

/// The closed set of events this crate emits. Additional applications can
/// still carry their own payloads through the bus's filter mechanism by
/// stuffing values into a `StoreKeyEvent`-shaped variant's fields, but the
/// taxonomy itself is fixed, matching the finite event vocabulary spec.md
/// §6 names.
#[derive(Debug, Clone)]
pub enum Event {
    StoreModification(StoreKeyEvent),
    StoreTransactionStart { source: String },
    StoreTransactionEnd(StoreTransactionEndEvent),
    Progress(ProgressEvent),
    StoreProgress(StoreProgressEvent),
    Heartbeat(HeartbeatEvent),
}

impl Event {
    pub fn class(&self) -> EventClass {
        match self {
            Event::StoreModification(e) => match e.kind {
                StoreModificationKind::Set => EventClass::StoreSet,
                StoreModificationKind::Update => EventClass::StoreUpdate,
                StoreModificationKind::Delete => EventClass::StoreDelete,
            },
            Event::StoreTransactionStart { .. } => EventClass::StoreTransactionStart,
            Event::StoreTransactionEnd(_) => EventClass::StoreTransactionEnd,
            Event::Progress(e) => match e.kind {
                ProgressKind::Start => EventClass::ProgressStart,
                ProgressKind::Step => EventClass::ProgressStep,
                ProgressKind::End => EventClass::ProgressEnd,
            },
            Event::StoreProgress(e) => match e.kind {
                ProgressKind::Start => EventClass::StoreProgressStart,
                ProgressKind::Step => EventClass::StoreProgressStep,
                ProgressKind::End => EventClass::StoreProgressEnd,
            },
            Event::Heartbeat(_) => EventClass::Heartbeat,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Event::StoreModification(e) => &e.source,
            Event::StoreTransactionStart { source } => source,
            Event::StoreTransactionEnd(e) => &e.source,
            Event::Progress(e) => &e.source,
            Event::StoreProgress(e) => &e.source,
            Event::Heartbeat(e) => &e.source,
        }
    }

    /// Resolve a named field for filter matching. Supports the fields a
    /// listener is likely to filter on (`source`, `key`, `outcome`); unknown
    /// names never match, so a stray filter key simply excludes the
    /// listener rather than panicking.
    pub fn field(&self, name: &str) -> Option<FilterValue> {
        match (self, name) {
            (_, "source") => Some(FilterValue::Str(self.source().to_owned())),
            (Event::StoreModification(e), "key") => Some(FilterValue::Str(e.key.clone())),
            (Event::StoreProgress(e), "key") => Some(FilterValue::Str(e.key.clone())),
            (Event::StoreTransactionEnd(e), "outcome") => Some(FilterValue::Bool(matches!(
                e.outcome,
                TransactionOutcome::Done
            ))),
            (Event::Progress(e), "operation_id") => Some(FilterValue::U64(e.operation_id)),
            (Event::StoreProgress(e), "operation_id") => Some(FilterValue::U64(e.operation_id)),
            _ => None,
        }
    }

    pub fn matches(&self, filters: &Filters) -> bool {
        filters
            .iter()
            .all(|(name, expected)| self.field(name).as_ref() == Some(expected))
    }
}
