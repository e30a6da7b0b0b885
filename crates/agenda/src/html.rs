use anyhow::Result;
use chrono::NaiveDateTime;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use std::fs;
use std::path::Path;

use crate::dates::{self, CalendarDate, MONTH_NAMES, WEEKDAY_LABELS};
use crate::grid::{self, GridCell, MonthGrid};
use crate::session::Session;
use crate::types::{DateKey, Event, Snapshot};
use crate::upcoming::{self, UpcomingEntry, DEFAULT_LIMIT, EMPTY_PLACEHOLDER};

/// Everything one page render needs. All views derive from the same snapshot.
pub struct PageView<'a> {
    pub session: &'a Session,
    pub snapshot: &'a Snapshot,
    pub today: CalendarDate,
    pub now: NaiveDateTime,
    pub notice: Option<&'a str>,
}

/// Write a static page for the given state
pub fn generate_html(view: &PageView<'_>, path: &Path) -> Result<()> {
    let html = render_page(view);
    fs::write(path, html.into_string())?;
    Ok(())
}

pub fn render_page(view: &PageView<'_>) -> Markup {
    let (year, month_index) = view.session.view();
    let month = grid::project_month(
        year,
        month_index,
        view.snapshot,
        view.session.selected(),
        view.today,
    );
    let upcoming = upcoming::project_upcoming(view.snapshot, view.now, DEFAULT_LIMIT);

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "Agenda" }
                style { (PreEscaped(CSS)) }
            }
            body {
                div.layout {
                    main.calendar {
                        (render_toolbar(view.session, &month))
                        @if let Some(notice) = view.notice {
                            div.notice role="alert" { (notice) }
                        }
                        (render_grid(&month))
                    }
                    aside.sidebar {
                        (render_selected_panel(view.session, view.snapshot))
                        (render_upcoming(&upcoming))
                    }
                }
            }
        }
    }
}

fn render_toolbar(session: &Session, month: &MonthGrid) -> Markup {
    html! {
        header.toolbar {
            form method="post" action="/nav" {
                button #"prev-month" type="submit" name="delta" value="-1" { "‹" }
            }
            h1 #"month-title" { (month.title) }
            form method="post" action="/nav" {
                button #"next-month" type="submit" name="delta" value="1" { "›" }
            }
            form method="post" action="/nav/today" {
                button #"today-btn" type="submit" { "Today" }
            }
            form.jump method="post" action="/nav/goto" {
                select #"month-select" name="month" {
                    @for (index, name) in MONTH_NAMES.iter().enumerate() {
                        option value=(index) selected[index as u32 == month.month_index] { (name) }
                    }
                }
                select #"year-select" name="year" {
                    @for year in session.year_window() {
                        option value=(year) selected[year == month.year] { (year) }
                    }
                }
                button type="submit" { "Go" }
            }
        }
    }
}

fn render_grid(month: &MonthGrid) -> Markup {
    html! {
        div.grid #"calendar-grid" {
            @for label in WEEKDAY_LABELS {
                div.weekday { (label) }
            }
            @for cell in &month.cells {
                @match cell {
                    GridCell::Padding => {
                        div.cell.muted { span.day-number {} }
                    }
                    GridCell::Day(day) => {
                        form.cell.today[day.is_today].selected[day.is_selected]
                            method="post" action="/select" {
                            button type="submit" name="date" value=(day.date_key.to_string())
                                aria-label=(day.label) {
                                span.day-number { (day.date.day) }
                                @if day.has_events {
                                    span.has-events-dot {}
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn render_selected_panel(session: &Session, snapshot: &Snapshot) -> Markup {
    let selected = session.selected();
    let editing = session.editing();
    let form = session.form();
    let action = if editing.is_some() { "/events/save" } else { "/events" };
    let editing_id = editing.as_ref().map(|(_, id)| *id);

    html! {
        section.panel {
            h2 #"selected-date-text" {
                @if let Some(date) = selected {
                    (date.format_long())
                } @else {
                    "Select a date"
                }
            }
            form.event-form method="post" action=(action) {
                input #"event-title" type="text" name="title" placeholder="Title"
                    value=(form.title);
                input #"event-time" type="time" name="time" value=(form.time);
                textarea #"event-notes" name="notes" placeholder="Notes" { (form.notes) }
                @if editing.is_some() {
                    button #"save-event-btn" type="submit" { "Save" }
                    button #"cancel-edit-btn" type="submit" formaction="/events/cancel" { "Cancel" }
                } @else {
                    button #"add-event-btn" type="submit" disabled[selected.is_none()] { "Add" }
                }
            }
            ul.event-list #"events-for-date" {
                @if let Some(date) = selected {
                    @let key = DateKey::from_date(date);
                    @for event in upcoming::sort_for_date(snapshot.events_on(&key)) {
                        (render_event_item(&key, event, editing_id == Some(event.id.as_str())))
                    }
                }
            }
        }
    }
}

fn render_event_item(key: &DateKey, event: &Event, being_edited: bool) -> Markup {
    let pressed = if event.completed { "true" } else { "false" };

    html! {
        li.event-item.completed[event.completed].editing[being_edited] {
            div.event-title-row {
                form method="post" action="/events/toggle" {
                    input type="hidden" name="date" value=(key.to_string());
                    input type="hidden" name="id" value=(event.id);
                    button.checkbox type="submit" aria-pressed=(pressed) {
                        @if event.completed { "☑" } @else { "☐" }
                    }
                }
                p.event-title { (event.title) }
                span.event-time { (event.time) }
            }
            p.event-notes { (event.notes) }
            div.event-buttons {
                form method="post" action="/events/edit" {
                    input type="hidden" name="date" value=(key.to_string());
                    input type="hidden" name="id" value=(event.id);
                    button type="submit" { "Edit" }
                }
                form method="post" action="/events/delete" {
                    input type="hidden" name="date" value=(key.to_string());
                    input type="hidden" name="id" value=(event.id);
                    button type="submit" { "Delete" }
                }
            }
        }
    }
}

fn render_upcoming(entries: &[UpcomingEntry]) -> Markup {
    html! {
        section.panel {
            h2 { "Upcoming" }
            ul.event-list #"upcoming-events" {
                @for entry in entries {
                    li.event-item.upcoming {
                        form method="post" action="/select" {
                            button type="submit" name="date" value=(entry.date_key.to_string()) {
                                div.event-title-row {
                                    p.event-title { (entry.title) }
                                    span.event-time { (entry.stamp) }
                                }
                                p.event-notes { (entry.notes) }
                            }
                        }
                    }
                }
                @if entries.is_empty() {
                    li.event-item.placeholder { (EMPTY_PLACEHOLDER) }
                }
            }
        }
    }
}

/// Plain-text month grid for terminal output. Today is marked with `[`,
/// days with events with `*`.
pub fn render_text_grid(month: &MonthGrid) -> String {
    let mut out = format!("{:^27}\n", month.title);
    let header: Vec<String> = WEEKDAY_LABELS.iter().map(|l| format!("{:>3}", &l[..2])).collect();
    out.push_str(&header.join(" "));
    out.push('\n');
    for row in month.rows() {
        let line: Vec<String> = row
            .iter()
            .map(|cell| match cell {
                GridCell::Padding => "   ".to_string(),
                GridCell::Day(day) => {
                    let marker = if day.is_today {
                        '['
                    } else if day.has_events {
                        '*'
                    } else {
                        ' '
                    };
                    format!("{}{:>2}", marker, day.date.day)
                }
            })
            .collect();
        out.push_str(line.join(" ").trim_end());
        out.push('\n');
    }
    out
}

/// One line per upcoming entry, or the placeholder
pub fn render_text_upcoming(entries: &[UpcomingEntry]) -> String {
    if entries.is_empty() {
        return format!("{EMPTY_PLACEHOLDER}\n");
    }
    entries
        .iter()
        .map(|e| format!("{}  {}  [{}]\n", e.stamp, e.title, e.id))
        .collect()
}

/// Long form of a date key for headings, e.g. "January 5, 2025"
pub fn long_date(key: &DateKey) -> String {
    let date = key.date();
    dates::format_long(date.year, date.month_index, date.day)
}

const CSS: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }

body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
    background: #101418;
    color: #e8ecef;
    min-height: 100vh;
    line-height: 1.4;
}

.layout {
    display: grid;
    grid-template-columns: minmax(0, 2fr) minmax(280px, 1fr);
    gap: 24px;
    max-width: 1200px;
    margin: 0 auto;
    padding: 32px 24px;
}

.toolbar {
    display: flex;
    align-items: center;
    gap: 12px;
    margin-bottom: 20px;
    flex-wrap: wrap;
}

.toolbar h1 {
    font-size: 1.6em;
    min-width: 220px;
    text-align: center;
}

.toolbar .jump { margin-left: auto; display: flex; gap: 6px; }

button, select, input, textarea {
    font: inherit;
    color: inherit;
    background: #1c232b;
    border: 1px solid #2e3944;
    border-radius: 6px;
    padding: 6px 10px;
}

button { cursor: pointer; }
button:disabled { opacity: 0.4; cursor: not-allowed; }

.notice {
    background: #4a2626;
    border: 1px solid #a34848;
    border-radius: 6px;
    padding: 10px 14px;
    margin-bottom: 16px;
}

.grid {
    display: grid;
    grid-template-columns: repeat(7, 1fr);
    gap: 6px;
}

.weekday {
    text-align: center;
    font-size: 0.8em;
    color: #8a97a3;
    text-transform: uppercase;
    letter-spacing: 0.08em;
}

.cell { aspect-ratio: 1 / 1; position: relative; }
.cell.muted { background: #141a20; border-radius: 8px; }

.cell button {
    width: 100%;
    height: 100%;
    display: flex;
    flex-direction: column;
    align-items: flex-start;
    justify-content: space-between;
    border-radius: 8px;
}

.cell.today button { border-color: #4fb3ff; }
.cell.selected button { background: #24415c; border-color: #7cc7ff; }

.has-events-dot {
    width: 8px;
    height: 8px;
    border-radius: 50%;
    background: #ff7ab6;
    align-self: center;
}

.sidebar { display: flex; flex-direction: column; gap: 24px; }

.panel h2 { font-size: 1.1em; margin-bottom: 12px; }

.event-form { display: grid; gap: 8px; margin-bottom: 16px; }
.event-form textarea { min-height: 60px; resize: vertical; }

.event-list { list-style: none; display: grid; gap: 8px; }

.event-item {
    background: #1a2129;
    border: 1px solid #26313b;
    border-radius: 8px;
    padding: 10px 12px;
}

.event-item.editing { border-color: #7cc7ff; }
.event-item.completed .event-title { text-decoration: line-through; opacity: 0.6; }
.event-item.completed .event-notes { opacity: 0.6; }
.event-item.placeholder { color: #8a97a3; }
.event-item.upcoming button { all: unset; cursor: pointer; display: block; width: 100%; }

.event-title-row { display: flex; align-items: center; gap: 10px; }
.event-title { flex: 1; font-weight: 600; }
.event-time { color: #8a97a3; font-size: 0.85em; }
.event-notes { color: #b7c2cc; font-size: 0.9em; margin-top: 4px; }
.event-buttons { display: flex; gap: 6px; margin-top: 8px; }
.checkbox { padding: 0 6px; }
"#;
