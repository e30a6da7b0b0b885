//! Month grid projection: a fixed 6×7 block of cells for any month.
//!
//! Six rows are always produced, even for months that fit in five, so the
//! rendered grid keeps the same height across navigation.

use serde::Serialize;

use crate::dates::{self, CalendarDate};
use crate::types::{DateKey, Snapshot};

pub const COLUMNS: usize = 7;
pub const ROWS: usize = 6;
pub const CELL_COUNT: usize = COLUMNS * ROWS;

/// A day inside the projected month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCell {
    pub date: CalendarDate,
    pub date_key: DateKey,
    pub is_today: bool,
    pub is_selected: bool,
    pub has_events: bool,
    /// "MonthName Day, Year"
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridCell {
    /// Alignment filler before day 1 or after the last day
    Padding,
    Day(DayCell),
}

impl GridCell {
    pub fn day(&self) -> Option<&DayCell> {
        match self {
            GridCell::Day(cell) => Some(cell),
            GridCell::Padding => None,
        }
    }

    #[cfg(test)]
    pub fn is_padding(&self) -> bool {
        matches!(self, GridCell::Padding)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month_index: u32,
    /// "MonthName Year"
    pub title: String,
    /// Always `CELL_COUNT` cells, row-major
    pub cells: Vec<GridCell>,
}

impl MonthGrid {
    pub fn rows(&self) -> impl Iterator<Item = &[GridCell]> {
        self.cells.chunks(COLUMNS)
    }

    pub fn days(&self) -> impl Iterator<Item = &DayCell> {
        self.cells.iter().filter_map(GridCell::day)
    }
}

/// Project a month against the current snapshot and UI state.
pub fn project_month(
    year: i32,
    month_index: u32,
    snapshot: &Snapshot,
    selected: Option<CalendarDate>,
    today: CalendarDate,
) -> MonthGrid {
    let total_days = dates::days_in_month(year, month_index) as i64;
    let first = dates::first_weekday(year, month_index) as i64;

    let cells = (0..CELL_COUNT as i64)
        .map(|index| {
            let day_number = index - first + 1;
            if day_number < 1 || day_number > total_days {
                return GridCell::Padding;
            }

            let date = CalendarDate::new(year, month_index, day_number as u32);
            let date_key = DateKey::from_date(date);
            GridCell::Day(DayCell {
                date,
                date_key,
                is_today: dates::is_today(date, today),
                is_selected: selected == Some(date),
                has_events: snapshot.has_events(&date_key),
                label: date.format_long(),
            })
        })
        .collect();

    MonthGrid {
        year,
        month_index,
        title: format!("{} {}", dates::month_name(month_index), year),
        cells,
    }
}
