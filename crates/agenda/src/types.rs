use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::dates::{self, CalendarDate};
use crate::error::{AgendaResult, ValidationError};

/// A single dated event attached to a calendar day
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Opaque unique ID, assigned once at creation
    pub id: String,

    /// Required, never empty after trimming
    pub title: String,

    /// "HH:MM" or empty
    #[serde(default)]
    pub time: String,

    #[serde(default)]
    pub notes: String,

    #[serde(default)]
    pub completed: bool,

    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub created_at: i64,
}

impl Event {
    /// Create a fresh, incomplete event from already-validated fields.
    pub fn new(fields: EventFields) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: fields.title,
            time: fields.time,
            notes: fields.notes,
            completed: false,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    /// Time of day used for ordering; an empty time counts as midnight.
    /// `None` if the stored value is not a valid "HH:MM".
    pub fn time_of_day(&self) -> Option<NaiveTime> {
        if self.time.is_empty() {
            return Some(NaiveTime::MIN);
        }
        NaiveTime::parse_from_str(&self.time, "%H:%M").ok()
    }

    pub fn fields(&self) -> EventFields {
        EventFields {
            title: self.title.clone(),
            time: self.time.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// The user-editable part of an event, as submitted by the form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct EventFields {
    pub title: String,
    pub time: String,
    pub notes: String,
}

impl EventFields {
    pub fn new(
        title: impl Into<String>,
        time: impl Into<String>,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            time: time.into(),
            notes: notes.into(),
        }
    }

    /// Trim every field and check the title and time.
    pub fn validated(&self) -> Result<EventFields, ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        let time = self.time.trim();
        if !time.is_empty() {
            let canonical = NaiveTime::parse_from_str(time, "%H:%M")
                .map(|t| t.format("%H:%M").to_string())
                .ok();
            if canonical.as_deref() != Some(time) {
                return Err(ValidationError::InvalidTime(time.to_string()));
            }
        }

        Ok(EventFields::new(title, time, self.notes.trim()))
    }

    #[cfg(test)]
    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.time.is_empty() && self.notes.is_empty()
    }
}

/// Canonical `YYYY-MM-DD` identity of a calendar day.
///
/// Ordering follows the calendar, so a map keyed by `DateKey` iterates
/// chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(CalendarDate);

impl DateKey {
    pub fn parse(key: &str) -> Result<Self, ValidationError> {
        dates::parse_date_key(key)
            .map(DateKey)
            .ok_or_else(|| ValidationError::InvalidDateKey(key.to_string()))
    }

    pub fn from_date(date: CalendarDate) -> Self {
        DateKey(date)
    }

    pub fn date(self) -> CalendarDate {
        self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.key())
    }
}

impl TryFrom<String> for DateKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DateKey::parse(&value)
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.to_string()
    }
}

/// Every stored event, grouped by day in insertion order.
///
/// A key is present only while its day has at least one event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    days: BTreeMap<DateKey, Vec<Event>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a stored snapshot. Days with an unusable key or no events are
    /// dropped; a document that is not a map of event lists is an error.
    pub fn from_json(json: &str) -> AgendaResult<Self> {
        let raw: BTreeMap<String, Vec<Event>> = serde_json::from_str(json)?;
        let mut days = BTreeMap::new();
        for (key, events) in raw {
            match DateKey::parse(&key) {
                Ok(date_key) if !events.is_empty() => {
                    days.insert(date_key, events);
                }
                Ok(_) => {}
                Err(e) => warn!(key = %key, error = %e, "Dropping stored day with invalid key"),
            }
        }
        Ok(Self { days })
    }

    pub fn to_json(&self) -> AgendaResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Events for one day in insertion order.
    pub fn events_on(&self, key: &DateKey) -> &[Event] {
        self.days.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_events(&self, key: &DateKey) -> bool {
        self.days.get(key).is_some_and(|events| !events.is_empty())
    }

    #[cfg(test)]
    pub fn contains_key(&self, key: &DateKey) -> bool {
        self.days.contains_key(key)
    }

    pub fn find(&self, key: &DateKey, id: &str) -> Option<&Event> {
        self.events_on(key).iter().find(|e| e.id == id)
    }

    pub fn find_mut(&mut self, key: &DateKey, id: &str) -> Option<&mut Event> {
        self.days.get_mut(key)?.iter_mut().find(|e| e.id == id)
    }

    pub fn push(&mut self, key: DateKey, event: Event) {
        self.days.entry(key).or_default().push(event);
    }

    /// Remove one event, dropping the day once it is empty.
    /// Returns false if nothing matched.
    pub fn remove(&mut self, key: &DateKey, id: &str) -> bool {
        let Some(events) = self.days.get_mut(key) else {
            return false;
        };
        let before = events.len();
        events.retain(|e| e.id != id);
        let removed = events.len() != before;
        if events.is_empty() {
            self.days.remove(key);
        }
        removed
    }

    /// Days in calendar order with their events in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&DateKey, &[Event])> {
        self.days.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn event_count(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
