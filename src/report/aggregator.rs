//! Sparse map → dense series transformation
//!
//! Expands a sparse `dateKey → metrics` map into a complete, ordered
//! series for a named timeframe. Every day in range is emitted, with
//! all-zero buckets synthesized where no data exists, so chart and table
//! consumers never handle missing days. Monthly windows collapse the dense
//! daily series into month buckets after totals are taken.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::DayMetrics;
use crate::report::Timeframe;
use crate::time::{days_inclusive, first_of_month, format_date_key, parse_date_key, TimeProvider};

/// One point of the output series: a day, or a month represented by its
/// first day when the timeframe aggregates monthly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyDataPoint {
    pub date: String,
    pub earnings: f64,
    pub new_customers: i64,
    pub new_referrals: i64,
    pub clicks_count: i64,
}

impl DailyDataPoint {
    fn zero(date: String) -> Self {
        Self {
            date,
            earnings: 0.0,
            new_customers: 0,
            new_referrals: 0,
            clicks_count: 0,
        }
    }
}

/// Totals summed over the daily values in range, prior to any monthly
/// aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportTotals {
    pub earnings: f64,
    pub clicks: i64,
    pub signups: i64,
    pub customers: i64,
}

impl ReportTotals {
    pub fn add(&mut self, metrics: &DayMetrics) {
        self.earnings += metrics.earnings;
        self.clicks += metrics.clicks;
        self.signups += metrics.signups;
        self.customers += metrics.customers;
    }

    /// Totals over every bucket in a sparse map, regardless of timeframe.
    pub fn of(daily: &BTreeMap<String, DayMetrics>) -> Self {
        let mut totals = Self::default();
        for metrics in daily.values() {
            totals.add(metrics);
        }
        totals
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub timeframe: Timeframe,
    pub start_date: String,
    pub end_date: String,
    pub overview: ReportTotals,
    pub series: Vec<DailyDataPoint>,
}

/// Aggregator bound to the report timezone; `today` is the only wall-clock
/// input, everything else is a pure function of the map and timeframe.
#[derive(Debug, Clone, Copy)]
pub struct ReportAggregator {
    time: TimeProvider,
}

impl ReportAggregator {
    pub fn new(time: TimeProvider) -> Self {
        Self { time }
    }

    pub fn run(&self, daily: &BTreeMap<String, DayMetrics>, timeframe: Timeframe) -> Report {
        run_at(daily, timeframe, self.time.today())
    }
}

/// Deterministic core: same inputs, bitwise-identical output.
pub fn run_at(
    daily: &BTreeMap<String, DayMetrics>,
    timeframe: Timeframe,
    today: NaiveDate,
) -> Report {
    let (start, end) = timeframe.resolve_bounds(today, daily);

    let mut overview = ReportTotals::default();
    let mut series = Vec::new();
    for day in days_inclusive(start, end) {
        let key = format_date_key(day);
        let metrics = daily.get(&key).copied().unwrap_or_default();
        overview.add(&metrics);
        series.push(DailyDataPoint {
            date: key,
            earnings: metrics.earnings,
            new_customers: metrics.customers,
            new_referrals: metrics.signups,
            clicks_count: metrics.clicks,
        });
    }

    if timeframe.is_monthly() {
        series = collapse_to_months(&series);
    }

    series.sort_by(|a, b| a.date.cmp(&b.date));

    Report {
        timeframe,
        start_date: format_date_key(start),
        end_date: format_date_key(end),
        overview,
        series,
    }
}

/// Group the dense daily series by calendar month, summing every field.
/// Each bucket is keyed by the first day of its month; `BTreeMap` keeps
/// the buckets ascending.
fn collapse_to_months(daily: &[DailyDataPoint]) -> Vec<DailyDataPoint> {
    let mut months: BTreeMap<String, DailyDataPoint> = BTreeMap::new();

    for point in daily {
        let Some(date) = parse_date_key(&point.date) else {
            continue;
        };
        let month_key = format_date_key(first_of_month(date));
        let bucket = months
            .entry(month_key.clone())
            .or_insert_with(|| DailyDataPoint::zero(month_key));
        bucket.earnings += point.earnings;
        bucket.new_customers += point.new_customers;
        bucket.new_referrals += point.new_referrals;
        bucket.clicks_count += point.clicks_count;
    }

    months.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn metrics(clicks: i64, signups: i64, customers: i64, earnings: f64) -> DayMetrics {
        DayMetrics {
            clicks,
            signups,
            customers,
            earnings,
        }
    }

    fn totals_of_series(series: &[DailyDataPoint]) -> ReportTotals {
        let mut totals = ReportTotals::default();
        for point in series {
            totals.earnings += point.earnings;
            totals.clicks += point.clicks_count;
            totals.signups += point.new_referrals;
            totals.customers += point.new_customers;
        }
        totals
    }

    #[test]
    fn last_30_days_with_three_populated_days() {
        let mut daily = BTreeMap::new();
        daily.insert("2024-06-01".to_string(), metrics(5, 1, 0, 10.0));
        daily.insert("2024-06-15".to_string(), metrics(3, 0, 1, 25.5));
        daily.insert("2024-06-30".to_string(), metrics(7, 2, 0, 4.5));

        let report = run_at(&daily, Timeframe::Last30Days, date(2024, 6, 30));

        assert_eq!(report.series.len(), 30);
        assert_eq!(report.series[0].date, "2024-06-01");
        assert_eq!(report.series[29].date, "2024-06-30");

        let zero_days = report
            .series
            .iter()
            .filter(|p| p.clicks_count == 0 && p.earnings == 0.0)
            .count();
        assert_eq!(zero_days, 27);

        assert_eq!(report.overview.clicks, 15);
        assert_eq!(report.overview.signups, 3);
        assert_eq!(report.overview.customers, 1);
        assert_eq!(report.overview.earnings, 40.0);
    }

    #[test]
    fn this_year_aggregates_to_twelve_months() {
        let mut daily = BTreeMap::new();
        daily.insert("2024-01-05".to_string(), metrics(2, 1, 0, 5.0));
        daily.insert("2024-01-20".to_string(), metrics(4, 0, 1, 15.0));
        daily.insert("2024-02-03".to_string(), metrics(6, 2, 0, 7.5));

        let report = run_at(&daily, Timeframe::ThisYear, date(2024, 6, 15));

        assert_eq!(report.series.len(), 12);
        assert_eq!(report.series[0].date, "2024-01-01");
        assert_eq!(report.series[11].date, "2024-12-01");

        assert_eq!(report.series[0].clicks_count, 6);
        assert_eq!(report.series[0].earnings, 20.0);
        assert_eq!(report.series[0].new_referrals, 1);
        assert_eq!(report.series[0].new_customers, 1);
        assert_eq!(report.series[1].clicks_count, 6);
        assert_eq!(report.series[1].earnings, 7.5);

        for month in &report.series[2..] {
            assert_eq!(month.clicks_count, 0);
            assert_eq!(month.earnings, 0.0);
        }
    }

    #[test]
    fn empty_account_yields_zero_filled_series_for_every_timeframe() {
        let daily = BTreeMap::new();
        let today = date(2024, 6, 15);

        for timeframe in Timeframe::ALL {
            let report = run_at(&daily, timeframe, today);
            assert!(!report.series.is_empty(), "{timeframe} produced no series");
            assert!(report
                .series
                .iter()
                .all(|p| p.clicks_count == 0 && p.earnings == 0.0));
            assert_eq!(report.overview, ReportTotals::default());
        }
    }

    #[test]
    fn yesterday_is_a_single_entry() {
        let mut daily = BTreeMap::new();
        daily.insert("2024-06-14".to_string(), metrics(9, 1, 1, 3.25));
        daily.insert("2024-06-15".to_string(), metrics(100, 0, 0, 99.0));

        let report = run_at(&daily, Timeframe::Yesterday, date(2024, 6, 15));

        assert_eq!(report.series.len(), 1);
        assert_eq!(report.series[0].date, "2024-06-14");
        assert_eq!(report.series[0].clicks_count, 9);
        assert_eq!(report.overview.earnings, 3.25);
    }

    #[test]
    fn totals_match_series_before_and_after_month_aggregation() {
        let mut daily = BTreeMap::new();
        daily.insert("2024-01-10".to_string(), metrics(1, 1, 1, 1.5));
        daily.insert("2024-03-04".to_string(), metrics(2, 0, 0, 2.5));
        daily.insert("2024-05-29".to_string(), metrics(4, 3, 2, 8.0));

        let daily_report = run_at(&daily, Timeframe::Last30Days, date(2024, 6, 15));
        assert_eq!(totals_of_series(&daily_report.series), daily_report.overview);

        let monthly_report = run_at(&daily, Timeframe::ThisYear, date(2024, 6, 15));
        assert_eq!(
            totals_of_series(&monthly_report.series),
            monthly_report.overview
        );
    }

    #[test]
    fn out_of_range_days_are_excluded_from_totals() {
        let mut daily = BTreeMap::new();
        daily.insert("2024-05-01".to_string(), metrics(50, 5, 5, 500.0));
        daily.insert("2024-06-10".to_string(), metrics(1, 0, 0, 2.0));

        let report = run_at(&daily, Timeframe::ThisMonth, date(2024, 6, 15));

        assert_eq!(report.overview.clicks, 1);
        assert_eq!(report.overview.earnings, 2.0);
    }

    #[test]
    fn series_is_dense_and_ascending_across_dst() {
        // 2024-03-10 is the US spring-forward date; the civil calendar
        // must still emit exactly one entry per day
        let daily = BTreeMap::new();
        let report = run_at(&daily, Timeframe::ThisMonth, date(2024, 3, 15));

        assert_eq!(report.series.len(), 31);
        for pair in report.series.windows(2) {
            let a = parse_date_key(&pair[0].date).unwrap();
            let b = parse_date_key(&pair[1].date).unwrap();
            assert_eq!(a.succ_opt().unwrap(), b);
        }
    }

    #[test]
    fn last_6_months_produces_six_buckets() {
        let mut daily = BTreeMap::new();
        daily.insert("2024-01-15".to_string(), metrics(3, 1, 0, 9.0));
        daily.insert("2024-06-01".to_string(), metrics(2, 0, 1, 6.0));

        let report = run_at(&daily, Timeframe::Last6Months, date(2024, 6, 15));

        assert_eq!(report.series.len(), 6);
        assert_eq!(report.series[0].date, "2024-01-01");
        assert_eq!(report.series[5].date, "2024-06-01");
        assert_eq!(report.series[0].clicks_count, 3);
        assert_eq!(report.series[5].clicks_count, 2);
    }

    #[test]
    fn all_time_narrowing_changes_bucket_count() {
        let mut young = BTreeMap::new();
        young.insert("2024-03-01".to_string(), metrics(1, 0, 0, 1.0));
        let report = run_at(&young, Timeframe::AllTime, date(2024, 6, 15));
        assert_eq!(report.series.len(), 12, "narrowed to this year");

        let mut old = BTreeMap::new();
        old.insert("2022-09-01".to_string(), metrics(1, 0, 0, 1.0));
        let report = run_at(&old, Timeframe::AllTime, date(2024, 6, 15));
        // 2022-06-15 .. 2024-06-15 inclusive touches 25 calendar months
        assert_eq!(report.series.len(), 25);
        assert_eq!(report.series[0].date, "2022-06-01");
    }

    #[test]
    fn run_is_deterministic() {
        let mut daily = BTreeMap::new();
        daily.insert("2024-06-02".to_string(), metrics(3, 2, 1, 0.75));

        let first = run_at(&daily, Timeframe::Last30Days, date(2024, 6, 15));
        let second = run_at(&daily, Timeframe::Last30Days, date(2024, 6, 15));
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_keys_in_the_map_are_ignored() {
        let mut daily = BTreeMap::new();
        daily.insert("not-a-date".to_string(), metrics(99, 9, 9, 99.0));
        daily.insert("2024-06-10".to_string(), metrics(2, 0, 0, 1.0));

        let report = run_at(&daily, Timeframe::Last30Days, date(2024, 6, 15));
        assert_eq!(report.overview.clicks, 2);
    }
}
