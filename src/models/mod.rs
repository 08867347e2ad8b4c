pub mod metrics;
pub mod profile;

pub use metrics::{DayMetrics, DayMetricsPatch, ReportDocument};
pub use profile::Profile;
