//! Fixed-timezone civil calendar
//!
//! Every day boundary in the system is resolved in one configured IANA
//! timezone, so date keys are identical no matter where the process runs.
//! Wall-clock time enters through [`TimeProvider`] exactly once; everything
//! downstream works with calendar days (`NaiveDate`), never raw instants.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use chrono_tz::Tz;

/// Format of a date key, e.g. `2024-06-30`.
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Resolves "now" and date keys in the fixed report timezone.
#[derive(Debug, Clone, Copy)]
pub struct TimeProvider {
    tz: Tz,
}

impl TimeProvider {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn zone(&self) -> Tz {
        self.tz
    }

    /// Current civil date in the report timezone.
    pub fn today(&self) -> NaiveDate {
        self.civil_date(Utc::now())
    }

    /// Civil date of an instant in the report timezone.
    pub fn civil_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// `YYYY-MM-DD` key of an instant in the report timezone.
    pub fn date_key(&self, instant: DateTime<Utc>) -> String {
        format_date_key(self.civil_date(instant))
    }

    /// Date key for the current civil day.
    pub fn today_key(&self) -> String {
        format_date_key(self.today())
    }
}

pub fn format_date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` key. Returns `None` for anything malformed.
pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).ok()
}

/// Every calendar day from `start` to `end` inclusive, ascending.
///
/// Steps whole calendar days, so a range spanning a DST shift in the report
/// timezone never skips or duplicates a date. Empty when `start > end`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(current);
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    days
}

/// First calendar day of the month containing `date`.
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last calendar day of the month containing `date`.
pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    let first = first_of_month(date);
    match first.checked_add_months(Months::new(1)) {
        Some(next_month) => next_month.pred_opt().unwrap_or(first),
        None => first,
    }
}
