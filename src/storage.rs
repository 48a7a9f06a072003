// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;

use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;
use crate::types::timestamp::Timestamp;

/// The key the snapshot is stored under.
pub const STORE_KEY: &str = "srsStore";

/// Durable storage for a single raw snapshot.
pub trait SnapshotStorage {
    /// Return the stored snapshot, or `None` if nothing has been saved.
    fn read(&self) -> Fallible<Option<String>>;

    /// Replace the stored snapshot. Must be durable when it returns.
    fn write(&mut self, raw: &str) -> Fallible<()>;

    /// Remove the stored snapshot. Clearing an empty storage is a no-op.
    fn clear(&mut self) -> Fallible<()>;
}

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn new(database_path: &str) -> Fallible<Self> {
        let mut conn = Connection::open(database_path)?;
        {
            let tx = conn.transaction()?;
            if !probe_schema_exists(&tx)? {
                tx.execute_batch(include_str!("schema.sql"))?;
                tx.commit()?;
            }
        }
        Ok(Self { conn })
    }

    /// Open an existing database without creating or modifying anything.
    /// Writes through this handle fail.
    pub fn open_read_only(database_path: &str) -> Fallible<Self> {
        let conn = Connection::open_with_flags(database_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        if !probe_schema_exists(&conn)? {
            return fail("the database has no snapshot table.");
        }
        Ok(Self { conn })
    }

    /// When the snapshot was last written.
    pub fn saved_at(&self) -> Fallible<Option<Timestamp>> {
        let sql = "select saved_at from snapshots where key = ?;";
        let saved_at: Option<Timestamp> = self
            .conn
            .query_row(sql, [STORE_KEY], |row| row.get(0))
            .optional()?;
        Ok(saved_at)
    }
}

impl SnapshotStorage for SqliteStorage {
    fn read(&self) -> Fallible<Option<String>> {
        let sql = "select value from snapshots where key = ?;";
        let value: Option<String> = self
            .conn
            .query_row(sql, [STORE_KEY], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn write(&mut self, raw: &str) -> Fallible<()> {
        let tx = self.conn.transaction()?;
        let sql = "insert into snapshots (key, value, saved_at) values (?, ?, ?) on conflict (key) do update set value = excluded.value, saved_at = excluded.saved_at;";
        tx.execute(sql, (STORE_KEY, raw, Timestamp::now()))?;
        tx.commit()?;
        Ok(())
    }

    fn clear(&mut self) -> Fallible<()> {
        let tx = self.conn.transaction()?;
        tx.execute("delete from snapshots where key = ?;", [STORE_KEY])?;
        tx.commit()?;
        Ok(())
    }
}

fn probe_schema_exists(conn: &Connection) -> Fallible<bool> {
    let sql = "select count(*) from sqlite_master where type='table' AND name=?;";
    let count: i64 = conn.query_row(sql, ["snapshots"], |row| row.get(0))?;
    Ok(count > 0)
}

/// In-memory storage. Clones share the same slot, so a test can keep a handle
/// to inspect what the engine wrote.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemorySlot>>,
}

#[derive(Default)]
struct MemorySlot {
    value: Option<String>,
    fail_writes: bool,
    writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(raw: impl Into<String>) -> Self {
        let storage = Self::new();
        if let Ok(mut slot) = storage.inner.lock() {
            slot.value = Some(raw.into());
        }
        storage
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut slot) = self.inner.lock() {
            slot.fail_writes = fail;
        }
    }

    /// The number of successful writes so far.
    pub fn writes(&self) -> usize {
        self.inner.lock().map(|slot| slot.writes).unwrap_or(0)
    }

    pub fn value(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|slot| slot.value.clone())
    }

    fn slot(&self) -> Fallible<std::sync::MutexGuard<'_, MemorySlot>> {
        self.inner
            .lock()
            .map_err(|_| ErrorReport::new("storage lock poisoned"))
    }
}

impl SnapshotStorage for MemoryStorage {
    fn read(&self) -> Fallible<Option<String>> {
        Ok(self.slot()?.value.clone())
    }

    fn write(&mut self, raw: &str) -> Fallible<()> {
        let mut slot = self.slot()?;
        if slot.fail_writes {
            return fail("storage is not writable.");
        }
        slot.value = Some(raw.to_string());
        slot.writes += 1;
        Ok(())
    }

    fn clear(&mut self) -> Fallible<()> {
        self.slot()?.value = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_sqlite_round_trip() -> Fallible<()> {
        let dir = tempdir()?;
        let path = dir.path().join("recall.db");
        let path = path.to_str().ok_or_else(|| ErrorReport::new("invalid path"))?;

        let mut storage = SqliteStorage::new(path)?;
        assert_eq!(storage.read()?, None);
        assert_eq!(storage.saved_at()?, None);
        storage.write("{\"version\":1}")?;
        storage.write("{\"version\":1,\"x\":2}")?;
        assert_eq!(storage.read()?.as_deref(), Some("{\"version\":1,\"x\":2}"));
        assert!(storage.saved_at()?.is_some());

        // Reopening sees the same data.
        let mut storage = SqliteStorage::new(path)?;
        assert_eq!(storage.read()?.as_deref(), Some("{\"version\":1,\"x\":2}"));

        storage.clear()?;
        assert_eq!(storage.read()?, None);
        storage.clear()?;
        Ok(())
    }

    #[test]
    fn test_read_only() -> Fallible<()> {
        let dir = tempdir()?;
        let path = dir.path().join("recall.db");
        let path = path.to_str().ok_or_else(|| ErrorReport::new("invalid path"))?;
        assert!(SqliteStorage::open_read_only(path).is_err());
        assert!(!dir.path().join("recall.db").exists());

        SqliteStorage::new(path)?.write("{}")?;
        let mut storage = SqliteStorage::open_read_only(path)?;
        assert_eq!(storage.read()?.as_deref(), Some("{}"));
        assert!(storage.write("{\"x\":1}").is_err());
        assert_eq!(storage.read()?.as_deref(), Some("{}"));
        Ok(())
    }

    #[test]
    fn test_memory_storage() -> Fallible<()> {
        let mut storage = MemoryStorage::new();
        let handle = storage.clone();
        storage.write("a")?;
        assert_eq!(handle.value().as_deref(), Some("a"));
        assert_eq!(handle.writes(), 1);
        handle.fail_writes(true);
        assert!(storage.write("b").is_err());
        assert_eq!(storage.read()?.as_deref(), Some("a"));
        storage.clear()?;
        assert_eq!(handle.value(), None);
        Ok(())
    }
}
