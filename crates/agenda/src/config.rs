//! Runtime configuration: command-line flags with environment fallbacks.

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use tracing::debug;

use crate::kv::{JsonFileStore, KeyValueStore, MemoryStore, SqliteStore};
use crate::store::EventStore;

pub const DATA_DIR_VAR: &str = "AGENDA_DATA_DIR";
pub const BACKEND_VAR: &str = "AGENDA_BACKEND";

/// SQLite database file name inside the data directory
pub const DB_FILE: &str = "agenda.db";

/// Where the event snapshot is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Backend {
    /// SQLite database in the data directory
    #[default]
    Sqlite,
    /// Plain JSON file in the data directory
    Json,
    /// Nothing is written to disk
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub backend: Backend,
}

impl Config {
    /// Combine explicit flags with `AGENDA_DATA_DIR` / `AGENDA_BACKEND`.
    ///
    /// Flags win; the environment (or a `.env` file) fills the gaps.
    pub fn resolve(data_dir: Option<PathBuf>, backend: Option<Backend>) -> Result<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::resolve_with(data_dir, backend, |name| std::env::var(name).ok())
    }

    fn resolve_with(
        data_dir: Option<PathBuf>,
        backend: Option<Backend>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let data_dir = data_dir
            .or_else(|| env(DATA_DIR_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let backend = match backend {
            Some(backend) => backend,
            None => match env(BACKEND_VAR) {
                Some(value) => Backend::from_str(&value, true)
                    .map_err(|e| anyhow::anyhow!("Invalid {BACKEND_VAR} value '{value}': {e}"))?,
                None => Backend::default(),
            },
        };

        Ok(Self { data_dir, backend })
    }

    /// Open the configured persistence medium and wrap it in an event store.
    pub fn open_store(&self) -> Result<EventStore> {
        let medium: Box<dyn KeyValueStore + Send> = match self.backend {
            Backend::Sqlite => {
                std::fs::create_dir_all(&self.data_dir).with_context(|| {
                    format!("Failed to create data directory {}", self.data_dir.display())
                })?;
                let db_path = self.data_dir.join(DB_FILE);
                Box::new(
                    SqliteStore::open(&db_path)
                        .with_context(|| {
                            format!("Failed to open database at {}", db_path.display())
                        })?,
                )
            }
            Backend::Json => Box::new(JsonFileStore::new(&self.data_dir)),
            Backend::Memory => Box::new(MemoryStore::new()),
        };

        debug!(backend = ?self.backend, dir = %self.data_dir.display(), "Opened event store");
        Ok(EventStore::new(medium))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DateKey, EventFields};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_flags_or_env() {
        let config = Config::resolve_with(None, None, env_from(&[])).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("."));
        assert_eq!(config.backend, Backend::Sqlite);
    }

    #[test]
    fn test_env_fills_missing_flags() {
        let env = env_from(&[(DATA_DIR_VAR, "/tmp/agenda"), (BACKEND_VAR, "JSON")]);
        let config = Config::resolve_with(None, None, env).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/agenda"));
        assert_eq!(config.backend, Backend::Json);
    }

    #[test]
    fn test_flags_override_env() {
        let env = env_from(&[(DATA_DIR_VAR, "/tmp/agenda"), (BACKEND_VAR, "json")]);
        let config =
            Config::resolve_with(Some(PathBuf::from("here")), Some(Backend::Memory), env).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("here"));
        assert_eq!(config.backend, Backend::Memory);
    }

    #[test]
    fn test_invalid_backend_env_is_an_error() {
        let env = env_from(&[(BACKEND_VAR, "postgres")]);
        assert!(Config::resolve_with(None, None, env).is_err());
    }

    #[test]
    fn test_open_store_for_each_backend() {
        let temp_dir = TempDir::new().unwrap();
        let key = DateKey::parse("2025-01-15").unwrap();

        for backend in [Backend::Sqlite, Backend::Json, Backend::Memory] {
            let config = Config {
                data_dir: temp_dir.path().join(format!("{backend:?}")),
                backend,
            };
            let mut store = config.open_store().unwrap();
            store.add(&key, &EventFields::new("Check", "", "")).unwrap();
            assert_eq!(store.load().event_count(), 1, "{backend:?}");
        }

        assert!(temp_dir.path().join("Sqlite").join(DB_FILE).exists());
    }
}
