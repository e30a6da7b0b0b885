//! Cross-date and per-date orderings of the stored events.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use crate::dates;
use crate::types::{DateKey, Event, Snapshot};

pub const DEFAULT_LIMIT: usize = 10;

/// Shown in place of an empty upcoming list.
pub const EMPTY_PLACEHOLDER: &str = "No upcoming incomplete events yet.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingEntry {
    pub date_key: DateKey,
    pub id: String,
    pub title: String,
    pub time: String,
    pub notes: String,
    pub when: NaiveDateTime,
    /// "MonthName D, YYYY" plus " • HH:MM" when a time is set
    pub stamp: String,
}

impl UpcomingEntry {
    fn new(date_key: DateKey, event: &Event, when: NaiveDateTime) -> Self {
        let date = date_key.date();
        let mut stamp = dates::format_long(date.year, date.month_index, date.day);
        if !event.time.is_empty() {
            stamp.push_str(" • ");
            stamp.push_str(&event.time);
        }

        Self {
            date_key,
            id: event.id.clone(),
            title: event.title.clone(),
            time: event.time.clone(),
            notes: event.notes.clone(),
            when,
            stamp,
        }
    }
}

/// The local wall-clock instant used as the "now" reference.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Incomplete events at or after `now`, soonest first, at most `limit`.
///
/// Events without a time count as midnight. Ties keep snapshot order (day,
/// then insertion).
pub fn project_upcoming(
    snapshot: &Snapshot,
    now: NaiveDateTime,
    limit: usize,
) -> Vec<UpcomingEntry> {
    let mut entries: Vec<UpcomingEntry> = Vec::new();

    for (date_key, events) in snapshot.iter() {
        let Some(date) = date_key.date().to_naive() else {
            continue;
        };
        for event in events.iter().filter(|e| !e.completed) {
            let Some(time) = event.time_of_day() else {
                debug!(
                    date = %date_key,
                    id = %event.id,
                    time = %event.time,
                    "Skipping event with unreadable time"
                );
                continue;
            };
            let when = date.and_time(time);
            if when >= now {
                entries.push(UpcomingEntry::new(*date_key, event, when));
            }
        }
    }

    entries.sort_by_key(|entry| entry.when);
    entries.truncate(limit);
    entries
}

/// One day's events for the side list: incomplete first, then by time.
pub fn sort_for_date(events: &[Event]) -> Vec<&Event> {
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by(|a, b| a.completed.cmp(&b.completed).then_with(|| a.time.cmp(&b.time)));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn event(id: &str, time: &str, completed: bool) -> Event {
        Event {
            id: id.to_string(),
            title: format!("Event {id}"),
            time: time.to_string(),
            notes: String::new(),
            completed,
            created_at: 0,
        }
    }

    fn at(date: &str, hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(hh, mm, 0)
            .unwrap()
    }

    fn snapshot(days: &[(&str, Vec<Event>)]) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for (key, events) in days {
            for e in events {
                snapshot.push(DateKey::parse(key).unwrap(), e.clone());
            }
        }
        snapshot
    }

    fn ids(entries: &[UpcomingEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_excludes_completed() {
        let snap = snapshot(&[(
            "2025-01-01",
            vec![event("nine", "09:00", false), event("eight", "08:00", true)],
        )]);
        let result = project_upcoming(&snap, at("2025-01-01", 0, 0), DEFAULT_LIMIT);
        assert_eq!(ids(&result), vec!["nine"]);
    }

    #[test]
    fn test_excludes_past_but_keeps_exact_now() {
        let snap = snapshot(&[
            ("2024-12-31", vec![event("yesterday", "23:59", false)]),
            (
                "2025-01-01",
                vec![event("early", "07:59", false), event("now", "08:00", false)],
            ),
        ]);
        let result = project_upcoming(&snap, at("2025-01-01", 8, 0), DEFAULT_LIMIT);
        assert_eq!(ids(&result), vec!["now"]);
    }

    #[test]
    fn test_orders_across_dates_and_times() {
        let snap = snapshot(&[
            ("2025-01-03", vec![event("c", "", false)]),
            (
                "2025-01-02",
                vec![event("b2", "17:00", false), event("b1", "06:30", false)],
            ),
        ]);
        let result = project_upcoming(&snap, at("2025-01-01", 0, 0), DEFAULT_LIMIT);
        assert_eq!(ids(&result), vec!["b1", "b2", "c"]);
    }

    #[test]
    fn test_missing_time_counts_as_midnight() {
        let snap = snapshot(&[(
            "2025-01-02",
            vec![event("late", "00:01", false), event("blank", "", false)],
        )]);
        let result = project_upcoming(&snap, at("2025-01-02", 0, 0), DEFAULT_LIMIT);
        assert_eq!(ids(&result), vec!["blank", "late"]);
        assert_eq!(result[0].when, at("2025-01-02", 0, 0));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let snap = snapshot(&[(
            "2025-01-02",
            vec![
                event("first", "10:00", false),
                event("second", "10:00", false),
                event("third", "10:00", false),
            ],
        )]);
        let result = project_upcoming(&snap, at("2025-01-01", 0, 0), DEFAULT_LIMIT);
        assert_eq!(ids(&result), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_limit_applies_after_sorting() {
        let events: Vec<Event> = (0..15)
            .rev()
            .map(|h| event(&format!("h{h:02}"), &format!("{h:02}:00"), false))
            .collect();
        let snap = snapshot(&[("2025-01-02", events)]);

        let result = project_upcoming(&snap, at("2025-01-01", 0, 0), DEFAULT_LIMIT);
        assert_eq!(result.len(), 10);
        assert_eq!(result[0].id, "h00");
        assert_eq!(result[9].id, "h09");

        assert_eq!(project_upcoming(&snap, at("2025-01-01", 0, 0), 3).len(), 3);
    }

    #[test]
    fn test_unreadable_time_is_skipped() {
        let snap = snapshot(&[(
            "2025-01-02",
            vec![event("bad", "soon", false), event("ok", "", false)],
        )]);
        let result = project_upcoming(&snap, at("2025-01-01", 0, 0), DEFAULT_LIMIT);
        assert_eq!(ids(&result), vec!["ok"]);
    }

    #[test]
    fn test_empty_snapshot_yields_nothing() {
        let result = project_upcoming(&Snapshot::new(), at("2025-01-01", 0, 0), DEFAULT_LIMIT);
        assert!(result.is_empty());
    }

    #[test]
    fn test_stamp_format() {
        let snap = snapshot(&[(
            "2025-03-09",
            vec![event("timed", "14:05", false), event("allday", "", false)],
        )]);
        let result = project_upcoming(&snap, at("2025-01-01", 0, 0), DEFAULT_LIMIT);
        assert_eq!(result[0].stamp, "March 9, 2025");
        assert_eq!(result[1].stamp, "March 9, 2025 • 14:05");
    }

    #[test]
    fn test_sort_for_date_incomplete_first_then_time() {
        let events = vec![event("ten", "10:00", true), event("nine", "09:00", false)];
        let sorted: Vec<&str> = sort_for_date(&events).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(sorted, vec!["nine", "ten"]);
    }

    #[test]
    fn test_sort_for_date_groups_and_orders() {
        let events = vec![
            event("done-early", "07:00", true),
            event("open-late", "20:00", false),
            event("open-blank", "", false),
            event("done-late", "21:00", true),
            event("open-early", "08:00", false),
        ];
        let sorted: Vec<&str> = sort_for_date(&events).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            sorted,
            vec!["open-blank", "open-early", "open-late", "done-early", "done-late"]
        );
    }
}
