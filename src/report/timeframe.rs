//! Named reporting windows
//!
//! A timeframe is a closed enumeration of dashboard windows, each mapped
//! deterministically to an inclusive `[start, end]` pair of civil days.
//! Unknown labels fall back to `Last30Days` rather than erroring.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::DayMetrics;
use crate::time::{first_of_month, last_of_month, parse_date_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Timeframe {
    Today,
    Yesterday,
    Last30Days,
    ThisMonth,
    LastMonth,
    Last6Months,
    ThisYear,
    AllTime,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Timeframe::Today,
        Timeframe::Yesterday,
        Timeframe::Last30Days,
        Timeframe::ThisMonth,
        Timeframe::LastMonth,
        Timeframe::Last6Months,
        Timeframe::ThisYear,
        Timeframe::AllTime,
    ];

    /// Parse a dashboard label. Anything unrecognized behaves as
    /// `Last 30 Days`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "today" => Timeframe::Today,
            "yesterday" => Timeframe::Yesterday,
            "last 30 days" => Timeframe::Last30Days,
            "this month" => Timeframe::ThisMonth,
            "last month" => Timeframe::LastMonth,
            "last 6 months" => Timeframe::Last6Months,
            "this year" => Timeframe::ThisYear,
            "all time" => Timeframe::AllTime,
            _ => Timeframe::Last30Days,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Today => "Today",
            Timeframe::Yesterday => "Yesterday",
            Timeframe::Last30Days => "Last 30 Days",
            Timeframe::ThisMonth => "This Month",
            Timeframe::LastMonth => "Last Month",
            Timeframe::Last6Months => "Last 6 Months",
            Timeframe::ThisYear => "This Year",
            Timeframe::AllTime => "All Time",
        }
    }

    /// Whether the series for this window is collapsed to month buckets.
    pub fn is_monthly(&self) -> bool {
        matches!(
            self,
            Timeframe::Last6Months | Timeframe::ThisYear | Timeframe::AllTime
        )
    }

    /// Inclusive civil-day bounds of this window, given today's date in
    /// the report timezone.
    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Timeframe::Today => (today, today),
            Timeframe::Yesterday => {
                let day = today.pred_opt().unwrap_or(today);
                (day, day)
            }
            Timeframe::Last30Days => {
                let start = today.checked_sub_days(Days::new(29)).unwrap_or(today);
                (start, today)
            }
            Timeframe::ThisMonth => (first_of_month(today), last_of_month(today)),
            Timeframe::LastMonth => {
                let prev = first_of_month(today).pred_opt().unwrap_or(today);
                (first_of_month(prev), last_of_month(prev))
            }
            Timeframe::Last6Months => {
                let start = first_of_month(today)
                    .checked_sub_months(Months::new(5))
                    .unwrap_or_else(|| first_of_month(today));
                (start, last_of_month(today))
            }
            // Anchored by year number rather than stepping a date, so the
            // bounds cannot drift at year boundaries
            Timeframe::ThisYear => {
                let jan1 = NaiveDate::from_ymd_opt(today.year(), 1, 1)
                    .unwrap_or_else(|| first_of_month(today));
                let dec31 = NaiveDate::from_ymd_opt(today.year(), 12, 31)
                    .unwrap_or_else(|| last_of_month(today));
                (jan1, dec31)
            }
            Timeframe::AllTime => {
                let start = today.checked_sub_months(Months::new(24)).unwrap_or(today);
                (start, today)
            }
        }
    }

    /// Bounds adjusted for the data actually present: an `AllTime` window
    /// over an account with no data older than a year narrows to this
    /// year, so young accounts do not render a mostly-empty two-year
    /// chart.
    pub fn resolve_bounds(
        &self,
        today: NaiveDate,
        daily: &BTreeMap<String, DayMetrics>,
    ) -> (NaiveDate, NaiveDate) {
        if matches!(self, Timeframe::AllTime) {
            let one_year_ago = today.checked_sub_months(Months::new(12)).unwrap_or(today);
            let has_old_data = daily
                .keys()
                .filter_map(|key| parse_date_key(key))
                .any(|date| date < one_year_ago);
            if !has_old_data {
                return Timeframe::ThisYear.bounds(today);
            }
        }
        self.bounds(today)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Timeframe {
    fn from(label: String) -> Self {
        Timeframe::parse(&label)
    }
}

impl From<Timeframe> for String {
    fn from(timeframe: Timeframe) -> Self {
        timeframe.label().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_known_labels() {
        for timeframe in Timeframe::ALL {
            assert_eq!(Timeframe::parse(timeframe.label()), timeframe);
        }
        assert_eq!(Timeframe::parse("last 30 days"), Timeframe::Last30Days);
        assert_eq!(Timeframe::parse(" This Year "), Timeframe::ThisYear);
    }

    #[test]
    fn unknown_label_falls_back_to_last_30_days() {
        assert_eq!(Timeframe::parse("Last 90 Days"), Timeframe::Last30Days);
        assert_eq!(Timeframe::parse(""), Timeframe::Last30Days);
        assert_eq!(Timeframe::parse("garbage"), Timeframe::Last30Days);
    }

    #[test]
    fn serde_round_trip_uses_labels() {
        let json = serde_json::to_string(&Timeframe::Last6Months).unwrap();
        assert_eq!(json, r#""Last 6 Months""#);
        let parsed: Timeframe = serde_json::from_str(r#""All Time""#).unwrap();
        assert_eq!(parsed, Timeframe::AllTime);
        let fallback: Timeframe = serde_json::from_str(r#""bogus""#).unwrap();
        assert_eq!(fallback, Timeframe::Last30Days);
    }

    #[test]
    fn today_and_yesterday_collapse_to_single_days() {
        let today = date(2024, 6, 15);
        assert_eq!(Timeframe::Today.bounds(today), (today, today));
        assert_eq!(
            Timeframe::Yesterday.bounds(today),
            (date(2024, 6, 14), date(2024, 6, 14))
        );
    }

    #[test]
    fn yesterday_crosses_month_and_year_boundaries() {
        assert_eq!(
            Timeframe::Yesterday.bounds(date(2024, 3, 1)),
            (date(2024, 2, 29), date(2024, 2, 29))
        );
        assert_eq!(
            Timeframe::Yesterday.bounds(date(2024, 1, 1)),
            (date(2023, 12, 31), date(2023, 12, 31))
        );
    }

    #[test]
    fn last_30_days_is_inclusive_of_today() {
        let (start, end) = Timeframe::Last30Days.bounds(date(2024, 6, 30));
        assert_eq!(start, date(2024, 6, 1));
        assert_eq!(end, date(2024, 6, 30));
    }

    #[test]
    fn month_windows_cover_whole_calendar_months() {
        let today = date(2024, 3, 15);
        assert_eq!(
            Timeframe::ThisMonth.bounds(today),
            (date(2024, 3, 1), date(2024, 3, 31))
        );
        assert_eq!(
            Timeframe::LastMonth.bounds(today),
            (date(2024, 2, 1), date(2024, 2, 29))
        );
    }

    #[test]
    fn last_month_wraps_the_year() {
        assert_eq!(
            Timeframe::LastMonth.bounds(date(2024, 1, 10)),
            (date(2023, 12, 1), date(2023, 12, 31))
        );
    }

    #[test]
    fn last_6_months_spans_six_calendar_months() {
        assert_eq!(
            Timeframe::Last6Months.bounds(date(2024, 6, 15)),
            (date(2024, 1, 1), date(2024, 6, 30))
        );
        assert_eq!(
            Timeframe::Last6Months.bounds(date(2024, 2, 10)),
            (date(2023, 9, 1), date(2024, 2, 29))
        );
    }

    #[test]
    fn this_year_is_anchored_by_year_number() {
        assert_eq!(
            Timeframe::ThisYear.bounds(date(2024, 7, 4)),
            (date(2024, 1, 1), date(2024, 12, 31))
        );
        assert_eq!(
            Timeframe::ThisYear.bounds(date(2024, 1, 1)),
            (date(2024, 1, 1), date(2024, 12, 31))
        );
    }

    #[test]
    fn all_time_defaults_to_two_year_lookback() {
        let mut daily = BTreeMap::new();
        daily.insert("2022-09-01".to_string(), DayMetrics::default());

        let (start, end) = Timeframe::AllTime.resolve_bounds(date(2024, 6, 15), &daily);
        assert_eq!(start, date(2022, 6, 15));
        assert_eq!(end, date(2024, 6, 15));
    }

    #[test]
    fn all_time_narrows_to_this_year_for_young_accounts() {
        let mut daily = BTreeMap::new();
        daily.insert("2024-02-01".to_string(), DayMetrics::default());
        daily.insert("2024-05-10".to_string(), DayMetrics::default());

        let bounds = Timeframe::AllTime.resolve_bounds(date(2024, 6, 15), &daily);
        assert_eq!(bounds, Timeframe::ThisYear.bounds(date(2024, 6, 15)));

        let empty = BTreeMap::new();
        let bounds = Timeframe::AllTime.resolve_bounds(date(2024, 6, 15), &empty);
        assert_eq!(bounds, Timeframe::ThisYear.bounds(date(2024, 6, 15)));
    }
}
