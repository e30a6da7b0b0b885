//! Calendar arithmetic for the month grid.
//!
//! Months are addressed by a 0-based `month_index` (0 = January) to match the
//! grid and form state; date keys on disk use the 1-based `YYYY-MM-DD` form.
//! Weekday math is done directly on the proleptic Gregorian calendar so any
//! `i32` year works, including years outside chrono's supported range.

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// A calendar day as the UI addresses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CalendarDate {
    pub year: i32,
    /// 0-based month (0 = January)
    pub month_index: u32,
    pub day: u32,
}

impl CalendarDate {
    pub fn new(year: i32, month_index: u32, day: u32) -> Self {
        Self {
            year,
            month_index,
            day,
        }
    }

    /// Today's date on the local wall clock.
    pub fn today() -> Self {
        Self::from_naive(Local::now().date_naive())
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month0(), date.day())
    }

    /// `None` when the year is outside the range chrono can represent.
    pub fn to_naive(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month_index + 1, self.day)
    }

    pub fn is_valid(self) -> bool {
        self.month_index < 12
            && self.day >= 1
            && self.day <= days_in_month(self.year, self.month_index)
    }

    pub fn key(self) -> String {
        date_key(self.year, self.month_index, self.day)
    }

    pub fn format_long(self) -> String {
        format_long(self.year, self.month_index, self.day)
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in the month, 28 through 31.
pub fn days_in_month(year: i32, month_index: u32) -> u32 {
    match month_index {
        1 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        3 | 5 | 8 | 10 => 30,
        _ => 31,
    }
}

/// Weekday of the 1st of the month, 0 = Sunday through 6 = Saturday.
pub fn first_weekday(year: i32, month_index: u32) -> u32 {
    weekday_of(year, month_index, 1)
}

/// Sakamoto's method, with floor division so negative years work.
fn weekday_of(year: i32, month_index: u32, day: u32) -> u32 {
    const OFFSETS: [i64; 12] = [0, 3, 2, 5, 0, 3, 5, 1, 4, 6, 2, 4];
    let mut y = year as i64;
    if month_index < 2 {
        y -= 1;
    }
    let sum = y + y.div_euclid(4) - y.div_euclid(100)
        + y.div_euclid(400)
        + OFFSETS[month_index as usize % 12]
        + day as i64;
    sum.rem_euclid(7) as u32
}

pub fn is_today(date: CalendarDate, today: CalendarDate) -> bool {
    date == today
}

/// "MonthName Day, Year"
pub fn format_long(year: i32, month_index: u32, day: u32) -> String {
    format!("{} {}, {}", month_name(month_index), day, year)
}

pub fn month_name(month_index: u32) -> &'static str {
    MONTH_NAMES.get(month_index as usize).copied().unwrap_or("Unknown")
}

/// Canonical `YYYY-MM-DD` key for a day.
pub fn date_key(year: i32, month_index: u32, day: u32) -> String {
    format!("{:04}-{:02}-{:02}", year, month_index + 1, day)
}

/// Inverse of [`date_key`]. Only canonical keys for real days are accepted.
pub fn parse_date_key(key: &str) -> Option<CalendarDate> {
    // Split from the right so a leading minus on the year survives.
    let mut parts = key.rsplitn(3, '-');
    let day: u32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let year: i32 = parts.next()?.parse().ok()?;
    if month == 0 {
        return None;
    }

    let date = CalendarDate::new(year, month - 1, day);
    if !date.is_valid() || date.key() != key {
        return None;
    }
    Some(date)
}

/// Move `delta` months from the given month, rolling the year over.
/// Stops at the first and last representable months.
pub fn shift_month(year: i32, month_index: u32, delta: i32) -> (i32, u32) {
    let total = i64::from(year) * 12 + i64::from(month_index) + i64::from(delta);
    match i32::try_from(total.div_euclid(12)) {
        Ok(year) => (year, total.rem_euclid(12) as u32),
        Err(_) if total < 0 => (i32::MIN, 0),
        Err(_) => (i32::MAX, 11),
    }
}
