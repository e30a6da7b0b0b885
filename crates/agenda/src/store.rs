//! Date-indexed event store.
//!
//! Every operation reads the whole snapshot from the persistence medium,
//! applies one change and writes the whole snapshot back before returning.
//! Nothing is cached between calls, so the slot is always the source of truth.

use tracing::{debug, info, warn};

use crate::error::{AgendaError, AgendaResult};
use crate::kv::KeyValueStore;
use crate::types::{DateKey, Event, EventFields, Snapshot};

/// Slot holding the serialized snapshot
pub const STORAGE_KEY: &str = "pda_calendar_events_v1";

pub struct EventStore<S = Box<dyn KeyValueStore + Send>> {
    medium: S,
}

#[cfg(test)]
impl EventStore<crate::kv::MemoryStore> {
    pub fn in_memory() -> Self {
        Self::new(crate::kv::MemoryStore::new())
    }
}

impl<S: KeyValueStore> EventStore<S> {
    pub fn new(medium: S) -> Self {
        Self { medium }
    }

    /// The persisted snapshot for display, or an empty one if the slot is
    /// missing, unreadable or corrupt.
    pub fn load(&self) -> Snapshot {
        match self.load_for_write() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to read stored events, showing none");
                Snapshot::new()
            }
        }
    }

    /// The snapshot a mutation builds on. A failed read is an error here:
    /// saving over it would replace every stored event.
    fn load_for_write(&self) -> AgendaResult<Snapshot> {
        let Some(raw) = self.medium.get(STORAGE_KEY)? else {
            return Ok(Snapshot::new());
        };

        match Snapshot::from_json(&raw) {
            Ok(snapshot) => {
                debug!(days = snapshot.day_count(), "Loaded snapshot");
                Ok(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "Stored events are corrupt, starting empty");
                Ok(Snapshot::new())
            }
        }
    }

    fn save(&mut self, snapshot: &Snapshot) -> AgendaResult<()> {
        let json = snapshot.to_json()?;
        self.medium.set(STORAGE_KEY, &json)?;
        debug!(events = snapshot.event_count(), "Saved snapshot");
        Ok(())
    }

    /// Append a new incomplete event to the day, returning its ID.
    pub fn add(&mut self, date_key: &DateKey, fields: &EventFields) -> AgendaResult<String> {
        let fields = fields.validated()?;
        let mut snapshot = self.load_for_write()?;

        let event = Event::new(fields);
        let id = event.id.clone();
        snapshot.push(*date_key, event);
        self.save(&snapshot)?;

        info!(date = %date_key, id = %id, "Added event");
        Ok(id)
    }

    /// Replace title, time and notes. `completed`, `id` and `createdAt` are kept.
    pub fn update(
        &mut self,
        date_key: &DateKey,
        event_id: &str,
        fields: &EventFields,
    ) -> AgendaResult<()> {
        let fields = fields.validated()?;
        let mut snapshot = self.load_for_write()?;

        let event = snapshot
            .find_mut(date_key, event_id)
            .ok_or_else(|| AgendaError::not_found(date_key.to_string(), event_id))?;
        event.title = fields.title;
        event.time = fields.time;
        event.notes = fields.notes;
        self.save(&snapshot)?;

        info!(date = %date_key, id = %event_id, "Updated event");
        Ok(())
    }

    /// Flip the completed flag. Returns false (and writes nothing) if the
    /// event does not exist.
    pub fn toggle_completed(&mut self, date_key: &DateKey, event_id: &str) -> AgendaResult<bool> {
        let mut snapshot = self.load_for_write()?;
        let Some(event) = snapshot.find_mut(date_key, event_id) else {
            debug!(date = %date_key, id = %event_id, "Toggle target not found");
            return Ok(false);
        };
        event.completed = !event.completed;
        let completed = event.completed;
        self.save(&snapshot)?;

        info!(date = %date_key, id = %event_id, completed, "Toggled event");
        Ok(true)
    }

    /// Remove an event; the day disappears with its last event. Returns false
    /// (and writes nothing) if the event does not exist.
    pub fn delete(&mut self, date_key: &DateKey, event_id: &str) -> AgendaResult<bool> {
        let mut snapshot = self.load_for_write()?;
        if !snapshot.remove(date_key, event_id) {
            debug!(date = %date_key, id = %event_id, "Delete target not found");
            return Ok(false);
        }
        self.save(&snapshot)?;

        info!(date = %date_key, id = %event_id, "Deleted event");
        Ok(true)
    }

    /// The raw stored document, for callers that need byte-level comparison.
    pub fn raw(&self) -> AgendaResult<Option<String>> {
        self.medium.get(STORAGE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::kv::{JsonFileStore, MemoryStore};
    use std::cell::Cell;
    use std::io;
    use tempfile::TempDir;

    fn key(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    fn fields(title: &str, time: &str) -> EventFields {
        EventFields::new(title, time, "")
    }

    // ========== load tests ==========

    #[test]
    fn test_load_empty_when_absent() {
        let store = EventStore::in_memory();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_empty_when_corrupt() {
        let mut medium = MemoryStore::new();
        medium.set(STORAGE_KEY, "{not json").unwrap();
        let store = EventStore::new(medium);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_reads_existing_widget_data() {
        let mut medium = MemoryStore::new();
        medium
            .set(
                STORAGE_KEY,
                concat!(
                    r#"{"2025-02-14":[{"id":"1739500000000","title":"Dinner","time":"19:30","#,
                    r#""notes":"","completed":true,"createdAt":1739500000000}]}"#,
                ),
            )
            .unwrap();
        let store = EventStore::new(medium);

        let snapshot = store.load();
        let events = snapshot.events_on(&key("2025-02-14"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Dinner");
        assert!(events[0].completed);
        assert_eq!(events[0].created_at, 1_739_500_000_000);
    }

    // ========== add tests ==========

    #[test]
    fn test_add_then_load() {
        let mut store = EventStore::in_memory();
        let day = key("2025-01-15");

        let id = store.add(&day, &EventFields::new("Buy milk", "", "")).unwrap();

        let snapshot = store.load();
        let events = snapshot.events_on(&day);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, id);
        assert_eq!(events[0].title, "Buy milk");
        assert!(!events[0].completed);
    }

    #[test]
    fn test_add_empty_title_rejected() {
        let mut store = EventStore::in_memory();
        let day = key("2025-01-15");
        store.add(&day, &fields("Existing", "")).unwrap();
        let before = store.raw().unwrap();

        let err = store.add(&day, &EventFields::new("", "", "")).unwrap_err();
        assert!(matches!(
            err,
            AgendaError::Validation(ValidationError::EmptyTitle)
        ));
        assert_eq!(store.raw().unwrap(), before);
    }

    #[test]
    fn test_add_whitespace_title_rejected_without_write() {
        let mut store = EventStore::in_memory();
        let err = store.add(&key("2025-01-15"), &fields("   ", "")).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.raw().unwrap(), None);
    }

    #[test]
    fn test_add_appends_in_insertion_order() {
        let mut store = EventStore::in_memory();
        let day = key("2025-01-15");
        store.add(&day, &fields("Second by time", "18:00")).unwrap();
        store.add(&day, &fields("First by time", "08:00")).unwrap();

        let snapshot = store.load();
        let titles: Vec<_> = snapshot.events_on(&day).iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Second by time", "First by time"]);
    }

    // ========== update tests ==========

    #[test]
    fn test_update_preserves_identity_and_completion() {
        let mut store = EventStore::in_memory();
        let day = key("2025-01-15");
        let id = store.add(&day, &fields("Draft", "09:00")).unwrap();
        store.toggle_completed(&day, &id).unwrap();
        let original = store.load().find(&day, &id).unwrap().clone();

        store
            .update(&day, &id, &EventFields::new("Final", "10:30", "room 4"))
            .unwrap();

        let snapshot = store.load();
        let updated = snapshot.find(&day, &id).unwrap();
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.time, "10:30");
        assert_eq!(updated.notes, "room 4");
        assert!(updated.completed);
        assert_eq!(updated.created_at, original.created_at);
    }

    #[test]
    fn test_update_missing_event_not_found() {
        let mut store = EventStore::in_memory();
        let err = store
            .update(&key("2025-01-15"), "nope", &fields("Title", ""))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_empty_title_rejected() {
        let mut store = EventStore::in_memory();
        let day = key("2025-01-15");
        let id = store.add(&day, &fields("Keep me", "")).unwrap();

        let err = store.update(&day, &id, &fields(" ", "")).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.load().find(&day, &id).unwrap().title, "Keep me");
    }

    // ========== toggle tests ==========

    #[test]
    fn test_toggle_flips_both_ways() {
        let mut store = EventStore::in_memory();
        let day = key("2025-01-15");
        let id = store.add(&day, &fields("Task", "")).unwrap();

        assert!(store.toggle_completed(&day, &id).unwrap());
        assert!(store.load().find(&day, &id).unwrap().completed);
        assert!(store.toggle_completed(&day, &id).unwrap());
        assert!(!store.load().find(&day, &id).unwrap().completed);
    }

    #[test]
    fn test_toggle_missing_is_noop() {
        let mut store = EventStore::in_memory();
        assert!(!store.toggle_completed(&key("2025-01-15"), "nope").unwrap());
        assert_eq!(store.raw().unwrap(), None);
    }

    // ========== delete tests ==========

    #[test]
    fn test_delete_only_event_removes_day() {
        let mut store = EventStore::in_memory();
        let day = key("2025-01-15");
        let id = store.add(&day, &fields("Only", "")).unwrap();

        assert!(store.delete(&day, &id).unwrap());
        assert!(!store.load().contains_key(&day));
    }

    #[test]
    fn test_delete_keeps_other_events() {
        let mut store = EventStore::in_memory();
        let day = key("2025-01-15");
        let a = store.add(&day, &fields("A", "")).unwrap();
        let b = store.add(&day, &fields("B", "")).unwrap();

        store.delete(&day, &a).unwrap();
        let snapshot = store.load();
        assert_eq!(snapshot.events_on(&day).len(), 1);
        assert_eq!(snapshot.events_on(&day)[0].id, b);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let mut store = EventStore::in_memory();
        let day = key("2025-01-15");
        store.add(&day, &fields("A", "")).unwrap();
        let before = store.raw().unwrap();

        assert!(!store.delete(&day, "nope").unwrap());
        assert!(!store.delete(&key("2025-01-16"), "nope").unwrap());
        assert_eq!(store.raw().unwrap(), before);
    }

    // ========== backend tests ==========

    #[test]
    fn test_json_backend_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let day = key("2025-03-01");

        let mut store = EventStore::new(JsonFileStore::new(temp_dir.path()));
        let id = store.add(&day, &fields("Persisted", "12:00")).unwrap();
        drop(store);

        let store = EventStore::new(JsonFileStore::new(temp_dir.path()));
        assert_eq!(store.load().find(&day, &id).unwrap().title, "Persisted");
    }

    #[test]
    fn test_corrupt_file_recovers_on_next_write() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(format!("{STORAGE_KEY}.json")), "garbage").unwrap();

        let mut store = EventStore::new(JsonFileStore::new(temp_dir.path()));
        assert!(store.load().is_empty());

        store.add(&key("2025-03-01"), &fields("Fresh", "")).unwrap();
        assert_eq!(store.load().event_count(), 1);
    }

    /// Medium whose reads can be made to fail on demand.
    struct FlakyMedium {
        inner: MemoryStore,
        fail_reads: Cell<bool>,
    }

    impl KeyValueStore for FlakyMedium {
        fn get(&self, key: &str) -> AgendaResult<Option<String>> {
            if self.fail_reads.get() {
                return Err(io::Error::other("disk unavailable").into());
            }
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> AgendaResult<()> {
            self.inner.set(key, value)
        }
    }

    #[test]
    fn test_failed_read_blocks_writes() {
        let mut store = EventStore::new(FlakyMedium {
            inner: MemoryStore::new(),
            fail_reads: Cell::new(false),
        });
        let day = key("2025-01-15");
        let first = store.add(&day, &fields("One", "")).unwrap();
        store.add(&day, &fields("Two", "")).unwrap();
        let before = store.raw().unwrap();

        store.medium.fail_reads.set(true);
        assert!(store.load().is_empty());
        assert!(matches!(
            store.add(&day, &fields("Three", "")),
            Err(AgendaError::Io(_))
        ));
        assert!(store.update(&day, &first, &fields("Renamed", "")).is_err());
        assert!(store.toggle_completed(&day, &first).is_err());
        assert!(store.delete(&day, &first).is_err());

        store.medium.fail_reads.set(false);
        assert_eq!(store.raw().unwrap(), before);
        assert_eq!(store.load().event_count(), 2);
    }
}
