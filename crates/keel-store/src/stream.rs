// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `to_file`/`from_file` streaming, grounded on
//! `encore/storage/utils.py::buffer_iterator` (chunked copy with a progress
//! callback) and `StoreProgressManager` (the per-key specialization of the
//! Progress Reporter used while streaming).

use std::io::{Read, Write};

use keel_core::EventBus;

use crate::store::{Metadata, ReadableStore, Result, Store};

const CHUNK_SIZE: usize = 64 * 1024;

pub(crate) fn copy_to_file<S: ReadableStore + ?Sized>(
    store: &S,
    key: &str,
    dest: &mut dyn Write,
    bus: &EventBus,
    source: &str,
) -> Result<()> {
    let mut value = store.get(key)?;
    let total = value.size();
    let mut reporter = keel_core::ProgressReporter::for_key(bus.clone(), source, key);
    reporter.start("to_file", total);

    let mut reader = value.data()?;
    let mut buf = [0u8; CHUNK_SIZE];
    let mut copied: u64 = 0;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        dest.write_all(&buf[..n])?;
        copied += n as u64;
        let _ = reporter.step(copied, "to_file");
    }
    let _ = reporter.end("to_file");
    Ok(())
}

pub(crate) fn copy_from_file<S: Store + ?Sized>(
    store: &S,
    key: &str,
    source_reader: &mut dyn Read,
    metadata: Metadata,
    bus: &EventBus,
    source: &str,
) -> Result<()> {
    let mut reporter = keel_core::ProgressReporter::for_key(bus.clone(), source, key);
    reporter.start("from_file", None);

    let mut buf = Vec::new();
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut copied: u64 = 0;
    loop {
        let n = source_reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        copied += n as u64;
        let _ = reporter.step(copied, "from_file");
    }
    let _ = reporter.end("from_file");
    store.set(key, buf, metadata)
}
