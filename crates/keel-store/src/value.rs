// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Value Abstraction (spec.md §4.E), grounded on
//! `encore/storage/abstract_store.py::Value` and the concrete
//! `string_value.py`/file-backed/URL-backed variants it names: a read-only
//! view over one stored item's bytes, metadata, size, timestamps, and
//! optional permissions.
//!
//! `encore` expresses the three variants as separate classes duck-typing a
//! shared protocol; Design Notes §9 asks for a tagged variant instead, so
//! [`Value`] wraps a private [`Payload`] enum rather than being a trait.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::PathBuf;

use crate::permissions::Permissions;
use crate::store::{Metadata, Result, StoreError};

enum Payload {
    /// Memory/byte-backed: `data` may be read more than once (a fresh
    /// [`Cursor`] is handed out each call).
    Bytes(Vec<u8>),
    /// File-backed: `data`/`range` open the file lazily and only once —
    /// consuming a second time is a programmer error, matching spec.md §3's
    /// "URL- and file-backed values [are not restartable]".
    File(PathBuf),
    /// URL-backed: bytes already fetched eagerly by the owning store (this
    /// crate's HTTP backends fetch synchronously rather than lazily opening
    /// a streaming connection), but still single-consumption to mirror the
    /// spec's restart rule.
    Url(Vec<u8>),
}

/// A read-only view over one stored item. See the module docs.
pub struct Value {
    payload: Payload,
    metadata: Metadata,
    permissions: Option<Permissions>,
    size: Option<u64>,
    created: Option<u64>,
    modified: Option<u64>,
    consumed: bool,
}

impl Value {
    pub fn from_bytes(
        data: Vec<u8>,
        metadata: Metadata,
        permissions: Option<Permissions>,
        created: Option<u64>,
        modified: Option<u64>,
    ) -> Self {
        let size = Some(data.len() as u64);
        Self {
            payload: Payload::Bytes(data),
            metadata,
            permissions,
            size,
            created,
            modified,
            consumed: false,
        }
    }

    pub fn from_file(
        path: PathBuf,
        metadata: Metadata,
        permissions: Option<Permissions>,
    ) -> io::Result<Self> {
        let stat = std::fs::metadata(&path)?;
        let modified = stat.modified().ok().and_then(epoch_secs);
        let created = stat.created().ok().and_then(epoch_secs).or(modified);
        Ok(Self {
            payload: Payload::File(path),
            metadata,
            permissions,
            size: Some(stat.len()),
            created,
            modified,
            consumed: false,
        })
    }

    pub fn from_url(
        data: Vec<u8>,
        metadata: Metadata,
        permissions: Option<Permissions>,
        modified: Option<u64>,
    ) -> Self {
        let size = Some(data.len() as u64);
        Self {
            payload: Payload::Url(data),
            metadata,
            permissions,
            size,
            created: None,
            modified,
            consumed: false,
        }
    }

    /// A copy of the stored metadata — never a live reference, per spec.md
    /// §3's "metadata returned to callers is always a copy" invariant.
    pub fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    pub fn permissions(&self) -> Option<&Permissions> {
        self.permissions.as_ref()
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn created(&self) -> Option<u64> {
        self.created
    }

    pub fn modified(&self) -> Option<u64> {
        self.modified
    }

    /// A readable stream over the value's bytes. Memory-backed values can be
    /// read any number of times; file- and URL-backed values can only be
    /// consumed once.
    pub fn data(&mut self) -> Result<Box<dyn Read + Send + '_>> {
        match &self.payload {
            Payload::Bytes(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            Payload::File(path) => {
                if self.consumed {
                    return Err(StoreError::BackendFailure(
                        "file-backed value already consumed".to_owned(),
                    ));
                }
                self.consumed = true;
                Ok(Box::new(File::open(path)?))
            }
            Payload::Url(bytes) => {
                if self.consumed {
                    return Err(StoreError::BackendFailure(
                        "url-backed value already consumed".to_owned(),
                    ));
                }
                self.consumed = true;
                Ok(Box::new(Cursor::new(bytes.clone())))
            }
        }
    }

    /// A stream over `[start, end)`. Native byte-range support belongs to
    /// the backend that constructs the `Value` (e.g. an HTTP `Range`
    /// request); here it's always synthesized by discarding the leading
    /// bytes and truncating the tail, per spec.md §4.E.
    pub fn range(&mut self, start: u64, end: u64) -> Result<Box<dyn Read + Send + '_>> {
        let mut reader = self.data()?;
        io::copy(&mut (&mut reader).take(start), &mut io::sink())?;
        Ok(Box::new(reader.take(end.saturating_sub(start))))
    }
}

fn epoch_secs(time: std::time::SystemTime) -> Option<u64> {
    time.duration_since(std::time::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
