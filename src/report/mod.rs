//! Report windows and timeframe aggregation

pub mod aggregator;
pub mod timeframe;

pub use aggregator::{run_at, DailyDataPoint, Report, ReportAggregator, ReportTotals};
pub use timeframe::Timeframe;
