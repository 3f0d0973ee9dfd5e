// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The sqlite backend (spec.md §4.F, §6): one table
//! `(key TEXT PRIMARY KEY, metadata BLOB, created REAL, modified REAL, data
//! BLOB)`, created on first connect if absent. Transactions use the
//! connection's native begin/commit/rollback via [`crate::transaction::SimpleTransaction`],
//! which is the one backend in this crate that can actually undo a
//! partially-applied transaction.

use keel_core::{Event, EventBus, StoreKeyEvent, StoreModificationKind};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::store::{Metadata, ReadableStore, Result, Store, StoreError, StoreInfo};
use crate::transaction::{SimpleTransaction, TransactionContext};
use crate::value::Value;

pub struct SqliteStore {
    bus: EventBus,
    name: String,
    table: String,
    conn: Mutex<Option<Connection>>,
    path: String,
}

impl SqliteStore {
    /// `path` is a `rusqlite`-style connection string; pass `":memory:"`
    /// for an in-process, non-persistent database.
    pub fn new(bus: EventBus, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            bus,
            name: name.into(),
            table: "store".to_owned(),
            conn: Mutex::new(None),
            path: path.into(),
        }
    }

    pub fn with_table_name(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(StoreError::NotConnected)?;
        f(conn)
    }

    fn row_to_value(key_metadata: Vec<u8>, created: f64, modified: f64, data: Vec<u8>) -> Result<Value> {
        let metadata: serde_json::Value = serde_json::from_slice(&key_metadata)?;
        let metadata = match metadata {
            serde_json::Value::Object(map) => map,
            _ => Metadata::new(),
        };
        Ok(Value::from_bytes(
            data,
            metadata,
            None,
            Some(created as u64),
            Some(modified as u64),
        ))
    }

    fn now() -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

impl ReadableStore for SqliteStore {
    fn connect(&self) -> Result<()> {
        let conn = Connection::open(&self.path)?;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    key TEXT PRIMARY KEY,
                    metadata BLOB NOT NULL,
                    created REAL NOT NULL,
                    modified REAL NOT NULL,
                    data BLOB NOT NULL
                )",
                self.table
            ),
            [],
        )?;
        *self.conn.lock() = Some(conn);
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        *self.conn.lock() = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.conn.lock().is_some()
    }

    fn info(&self) -> StoreInfo {
        StoreInfo {
            readonly: false,
            authorizing: false,
        }
    }

    fn get(&self, key: &str) -> Result<Value> {
        self.with_conn(|conn| {
            let row: Option<(Vec<u8>, f64, f64, Vec<u8>)> = conn
                .query_row(
                    &format!("SELECT metadata, created, modified, data FROM {} WHERE key = ?1", self.table),
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;
            let (metadata, created, modified, data) =
                row.ok_or_else(|| StoreError::KeyMissing(key.to_owned()))?;
            Self::row_to_value(metadata, created, modified, data)
        })
    }

    fn query(&self, select: Option<&[String]>, match_: &Metadata) -> Result<Vec<(String, Metadata)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT key, metadata FROM {}", self.table))?;
            let rows = stmt.query_map([], |row| {
                let key: String = row.get(0)?;
                let metadata: Vec<u8> = row.get(1)?;
                Ok((key, metadata))
            })?;
            let mut results = Vec::new();
            for row in rows {
                let (key, raw) = row?;
                let value: serde_json::Value = serde_json::from_slice(&raw)?;
                let metadata = match value {
                    serde_json::Value::Object(map) => map,
                    _ => Metadata::new(),
                };
                if match_.iter().all(|(k, v)| metadata.get(k) == Some(v)) {
                    let mut metadata = metadata;
                    if let Some(select) = select {
                        metadata.retain(|k, _| select.iter().any(|name| name == k));
                    }
                    results.push((key, metadata));
                }
            }
            Ok(results)
        })
    }
}

impl Store for SqliteStore {
    fn set(&self, key: &str, data: Vec<u8>, metadata: Metadata) -> Result<()> {
        let kind = self.with_conn(|conn| {
            let exists: bool = conn
                .query_row(
                    &format!("SELECT 1 FROM {} WHERE key = ?1", self.table),
                    params![key],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            let now = Self::now();
            conn.execute(
                &format!(
                    "INSERT INTO {} (key, metadata, created, modified, data) VALUES (?1, ?2, ?3, ?3, ?4)
                     ON CONFLICT(key) DO UPDATE SET metadata = excluded.metadata, modified = excluded.modified, data = excluded.data",
                    self.table
                ),
                params![key, serde_json::to_vec(&metadata)?, now, data],
            )?;
            Ok(if exists {
                StoreModificationKind::Update
            } else {
                StoreModificationKind::Set
            })
        })?;
        self.bus.emit(Event::StoreModification(StoreKeyEvent {
            source: self.name.clone(),
            key: key.to_owned(),
            kind,
        }));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let deleted = self.with_conn(|conn| {
            let count = conn.execute(
                &format!("DELETE FROM {} WHERE key = ?1", self.table),
                params![key],
            )?;
            Ok(count)
        })?;
        if deleted == 0 {
            return Err(StoreError::KeyMissing(key.to_owned()));
        }
        self.bus.emit(Event::StoreModification(StoreKeyEvent {
            source: self.name.clone(),
            key: key.to_owned(),
            kind: StoreModificationKind::Delete,
        }));
        Ok(())
    }

    fn transaction(&self, _notes: &str) -> Box<dyn TransactionContext + '_> {
        {
            let guard = self.conn.lock();
            if let Some(conn) = guard.as_ref() {
                let _ = conn.execute_batch("BEGIN");
            }
        }
        let commit = move || {
            self.with_conn(|conn| conn.execute_batch("COMMIT").map_err(Into::into))
        };
        let rollback = move || {
            self.with_conn(|conn| conn.execute_batch("ROLLBACK").map_err(Into::into))
        };
        SimpleTransaction::begin(self.bus.clone(), self.name.clone(), commit, rollback)
    }
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
