// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn result_returns_the_set_value() {
    let (promise, future) = promise_pair::<u32>();
    promise.set_result(42);
    assert_eq!(future.result(None).unwrap(), 42);
}

#[test]
fn result_propagates_failure_message() {
    let (promise, future) = promise_pair::<u32>();
    promise.set_exception("boom".to_owned());
    assert_eq!(
        future.result(None).unwrap_err(),
        FutureError::Failed("boom".to_owned())
    );
}

#[test]
fn result_times_out_while_pending() {
    let (_promise, future) = promise_pair::<u32>();
    assert_eq!(
        future.result(Some(Duration::from_millis(10))).unwrap_err(),
        FutureError::TimedOut
    );
}

#[test]
fn cancelled_future_reports_cancelled() {
    let (promise, future) = promise_pair::<u32>();
    promise.cancel();
    assert_eq!(future.result(None).unwrap_err(), FutureError::Cancelled);
}

#[test]
fn blocking_waiter_wakes_on_result_from_another_thread() {
    let (promise, future) = promise_pair::<u32>();
    let handle = std::thread::spawn(move || future.result(None));

    std::thread::sleep(Duration::from_millis(20));
    promise.set_result(7);

    assert_eq!(handle.join().unwrap().unwrap(), 7);
}
