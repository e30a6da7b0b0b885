//! Selection and edit state for the calendar UI.
//!
//! `Session` is an immutable value: every transition returns a new session
//! and leaves the old one untouched, so a failed transition simply keeps the
//! previous value. The host owns the one mutable slot holding the current
//! session.
//!
//! Invariants:
//! - add-mode (`Selected`) and edit-mode (`Editing`) are mutually exclusive
//! - an edit always targets an event on the selected date
//! - selecting a date or navigating months always leaves edit-mode

use std::ops::RangeInclusive;

use crate::dates::{self, CalendarDate};
use crate::error::{AgendaError, AgendaResult, ValidationError};
use crate::kv::KeyValueStore;
use crate::store::EventStore;
use crate::types::{DateKey, EventFields, Snapshot};

/// Years offered on either side of the centre year in the year picker
pub const YEAR_WINDOW_RADIUS: i32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No date selected
    Idle,
    /// A date is selected and the form adds new events to it
    Selected { date: CalendarDate },
    /// The form is editing one existing event on the selected date
    Editing { date: CalendarDate, event_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    view_year: i32,
    view_month: u32,
    year_center: i32,
    state: SessionState,
    form: EventFields,
}

impl Session {
    /// Idle session viewing the month that contains `today`.
    pub fn new(today: CalendarDate) -> Self {
        Self {
            view_year: today.year,
            view_month: today.month_index,
            year_center: today.year,
            state: SessionState::Idle,
            form: EventFields::default(),
        }
    }

    // ========== accessors ==========

    pub fn view(&self) -> (i32, u32) {
        (self.view_year, self.view_month)
    }

    #[cfg(test)]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn form(&self) -> &EventFields {
        &self.form
    }

    pub fn selected(&self) -> Option<CalendarDate> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::Selected { date } | SessionState::Editing { date, .. } => Some(*date),
        }
    }

    pub fn selected_key(&self) -> Option<DateKey> {
        self.selected().map(DateKey::from_date)
    }

    /// Date key and event ID of the event being edited.
    pub fn editing(&self) -> Option<(DateKey, &str)> {
        match &self.state {
            SessionState::Editing { date, event_id } => {
                Some((DateKey::from_date(*date), event_id.as_str()))
            }
            _ => None,
        }
    }

    pub fn is_add_mode(&self) -> bool {
        matches!(self.state, SessionState::Selected { .. })
    }

    pub fn is_edit_mode(&self) -> bool {
        matches!(self.state, SessionState::Editing { .. })
    }

    /// Years the year picker offers; re-centred whenever the view leaves it.
    pub fn year_window(&self) -> RangeInclusive<i32> {
        self.year_center.saturating_sub(YEAR_WINDOW_RADIUS)
            ..=self.year_center.saturating_add(YEAR_WINDOW_RADIUS)
    }

    // ========== transitions ==========

    /// Any state → `Selected`. The view follows the date to its month.
    pub fn select_date(&self, date: CalendarDate) -> Session {
        self.viewing(date.year, date.month_index)
            .with_state(SessionState::Selected { date })
    }

    /// `Selected`/`Editing` → `Editing`, populating the form from the event.
    /// No-op unless the event exists on the selected date.
    pub fn start_edit(&self, snapshot: &Snapshot, date_key: &DateKey, event_id: &str) -> Session {
        if self.selected_key().as_ref() != Some(date_key) {
            return self.clone();
        }
        let Some(event) = snapshot.find(date_key, event_id) else {
            return self.clone();
        };

        Session {
            state: SessionState::Editing {
                date: date_key.date(),
                event_id: event.id.clone(),
            },
            form: event.fields(),
            ..self.clone()
        }
    }

    /// Add an event to the selected date. Only valid in add-mode; on success
    /// the form is cleared.
    pub fn commit_add<S: KeyValueStore>(
        &self,
        store: &mut EventStore<S>,
        fields: &EventFields,
    ) -> AgendaResult<Session> {
        let date = match &self.state {
            SessionState::Idle => return Err(ValidationError::NoDateSelected.into()),
            SessionState::Editing { .. } => return Err(ValidationError::NotInAddMode.into()),
            SessionState::Selected { date } => *date,
        };

        store.add(&DateKey::from_date(date), fields)?;
        Ok(self.with_state(SessionState::Selected { date }))
    }

    /// Save the form over the event being edited and return to add-mode.
    pub fn commit_edit<S: KeyValueStore>(
        &self,
        store: &mut EventStore<S>,
        fields: &EventFields,
    ) -> AgendaResult<Session> {
        let SessionState::Editing { date, event_id } = &self.state else {
            return Err(ValidationError::NotEditing.into());
        };

        store.update(&DateKey::from_date(*date), event_id, fields)?;
        Ok(self.with_state(SessionState::Selected { date: *date }))
    }

    /// `Editing` → `Selected`, discarding the form. No-op in other states.
    pub fn cancel_edit(&self) -> Session {
        match &self.state {
            SessionState::Editing { date, .. } => {
                self.with_state(SessionState::Selected { date: *date })
            }
            _ => self.clone(),
        }
    }

    /// Delete an event. Leaves edit-mode if that event was being edited.
    pub fn delete_event<S: KeyValueStore>(
        &self,
        store: &mut EventStore<S>,
        date_key: &DateKey,
        event_id: &str,
    ) -> AgendaResult<Session> {
        store.delete(date_key, event_id)?;
        match self.editing() {
            Some((key, id)) if key == *date_key && id == event_id => Ok(self.cancel_edit()),
            _ => Ok(self.clone()),
        }
    }

    /// Step the view by `delta` months, clearing selection and edit-mode.
    pub fn change_month(&self, delta: i32) -> Session {
        let (year, month_index) = dates::shift_month(self.view_year, self.view_month, delta);
        self.viewing(year, month_index).with_state(SessionState::Idle)
    }

    /// Show a specific month, clearing selection and edit-mode. Out-of-range
    /// month indexes roll over into neighbouring years.
    pub fn go_to_month(&self, year: i32, month_index: u32) -> Session {
        let delta = i32::try_from(month_index).unwrap_or(i32::MAX);
        let (year, month_index) = dates::shift_month(year, 0, delta);
        self.viewing(year, month_index).with_state(SessionState::Idle)
    }

    /// View today's month with today selected.
    pub fn jump_to_today(&self, today: CalendarDate) -> Session {
        self.select_date(today)
    }

    /// Put back what the user typed after a rejected submission, so the
    /// form is not wiped by a validation error.
    pub fn with_form(&self, fields: EventFields) -> Session {
        Session {
            form: fields,
            ..self.clone()
        }
    }

    /// Session to continue with after `error`. A vanished edit target drops
    /// back to add-mode; anything else leaves the session unchanged.
    pub fn recover(&self, error: &AgendaError) -> Session {
        if error.is_not_found() {
            self.cancel_edit()
        } else {
            self.clone()
        }
    }

    // ========== helpers ==========

    fn viewing(&self, year: i32, month_index: u32) -> Session {
        let mut next = self.clone();
        next.view_year = year;
        next.view_month = month_index;
        if !next.year_window().contains(&year) {
            next.year_center = year;
        }
        next
    }

    /// Switch state with a blank form.
    fn with_state(&self, state: SessionState) -> Session {
        Session {
            state,
            form: EventFields::default(),
            ..self.clone()
        }
    }
}
