// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `HeartbeatEvent` is named in spec.md §6's event taxonomy but never
//! specified beyond that; this is additive scaffolding (SPEC_FULL.md),
//! modeled on `encore`'s periodic-event idiom, not a subsystem in its own
//! right.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::clock::Clock;
use crate::event::{Event, EventBus, HeartbeatEvent};

/// Emits a `HeartbeatEvent` on `source`'s bus every `interval` until
/// stopped. Owns a background thread; dropping it without calling `stop`
/// still joins the thread (best-effort), since leaving a detached thread
/// running past the `Heartbeat`'s lifetime would be surprising.
pub struct Heartbeat {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    pub fn start<C: Clock + 'static>(
        bus: EventBus,
        clock: C,
        source: impl Into<String>,
        interval: Duration,
    ) -> Self {
        let source = source.into();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();
        let interval_ms = interval.as_millis() as u64;

        let handle = std::thread::Builder::new()
            .name(format!("keel-heartbeat-{source}"))
            .spawn(move || {
                let mut frame = 0u64;
                while !stop_thread.load(Ordering::Relaxed) {
                    std::thread::sleep(interval);
                    if stop_thread.load(Ordering::Relaxed) {
                        break;
                    }
                    bus.emit(Event::Heartbeat(HeartbeatEvent {
                        source: source.clone(),
                        epoch_ms: clock.epoch_ms(),
                        frame,
                        interval_ms,
                    }));
                    frame += 1;
                }
            })
            .ok();

        Self { stop, handle }
    }

    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
