//! Error types for calendar operations.

use thiserror::Error;

/// Input rejected before anything touches the store or the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a title.")]
    EmptyTitle,

    #[error("Time must be HH:MM (24-hour), got '{0}'")]
    InvalidTime(String),

    #[error("Invalid date key '{0}', expected YYYY-MM-DD")]
    InvalidDateKey(String),

    #[error("Unknown month {0}")]
    InvalidMonth(u32),

    #[error("Click a day on the calendar first.")]
    NoDateSelected,

    #[error("Finish or cancel the current edit before adding a new event.")]
    NotInAddMode,

    #[error("No event is being edited.")]
    NotEditing,
}

/// Errors that can occur in calendar operations.
#[derive(Error, Debug)]
pub enum AgendaError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Could not find event {event_id} on {date_key}")]
    NotFound { date_key: String, event_id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgendaError {
    pub fn not_found(date_key: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self::NotFound {
            date_key: date_key.into(),
            event_id: event_id.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for calendar operations.
pub type AgendaResult<T> = Result<T, AgendaError>;
