//! Persistence medium: named string slots with get/set semantics.
//!
//! The event store keeps its whole snapshot in a single slot, so a backend
//! only needs to durably map a key to one opaque string. Three backends:
//! - SQLite (`kv_slots` table, schema managed by embedded migrations)
//! - JSON files (one `<key>.json` per slot in a data directory)
//! - in-memory (tests and throwaway sessions)

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::AgendaResult;

/// Migrations applied in order; the name is recorded in `schema_migrations`.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_kv_slots",
    include_str!("../db/migrations/001_kv_slots.sql"),
)];

pub trait KeyValueStore {
    fn get(&self, key: &str) -> AgendaResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> AgendaResult<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> AgendaResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> AgendaResult<()> {
        (**self).set(key, value)
    }
}

// ========== SQLite ==========

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at the given path, running any pending migrations
    pub fn open(db_path: &Path) -> AgendaResult<Self> {
        let conn = Connection::open(db_path)?;
        debug!(path = %db_path.display(), "Opened database");
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> AgendaResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> AgendaResult<Self> {
        let count = run_migrations(&conn)?;
        if count > 0 {
            info!(count = count, "Applied migrations");
        }
        Ok(Self { conn })
    }
}

/// Run pending embedded migrations, returning how many were applied
fn run_migrations(conn: &Connection) -> AgendaResult<usize> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    let mut applied = 0;
    for (version, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
            [version],
            |row| row.get(0),
        )?;
        if already_applied {
            continue;
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, datetime('now'))",
            [version],
        )?;
        tx.commit()?;

        debug!(version = %version, "Applied migration");
        applied += 1;
    }

    Ok(applied)
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> AgendaResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv_slots WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> AgendaResult<()> {
        self.conn.execute(
            "INSERT INTO kv_slots (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE
             SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }
}

// ========== JSON files ==========

pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> AgendaResult<Option<String>> {
        let path = self.slot_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        debug!(path = %path.display(), bytes = content.len(), "Read slot");
        Ok(Some(content))
    }

    fn set(&mut self, key: &str, value: &str) -> AgendaResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.slot_path(key);

        // Write then rename so a crash never leaves a half-written slot
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), bytes = value.len(), "Wrote slot");
        Ok(())
    }
}

// ========== In-memory ==========

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    slots: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> AgendaResult<Option<String>> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> AgendaResult<()> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
