// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::SystemClock;
use crate::event::{EventClass, Filters};
use std::sync::atomic::AtomicU64;
use std::time::Duration;

#[test]
fn heartbeat_emits_until_stopped() {
    let bus = EventBus::new();
    let count = Arc::new(AtomicU64::new(0));
    let count2 = count.clone();
    bus.connect(EventClass::Heartbeat, 0, Filters::new(), move |_| {
        count2.fetch_add(1, Ordering::Relaxed);
    });

    let heartbeat = Heartbeat::start(bus, SystemClock, "test", Duration::from_millis(5));
    std::thread::sleep(Duration::from_millis(40));
    heartbeat.stop();

    assert!(count.load(Ordering::Relaxed) >= 2);
}
