//! Day-bucket metrics models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metrics for one user on one civil day.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DayMetrics {
    #[serde(default)]
    pub clicks: i64,

    #[serde(default)]
    pub signups: i64,

    #[serde(default)]
    pub customers: i64,

    #[serde(default)]
    pub earnings: f64,
}

impl DayMetrics {
    /// Apply an additive patch. Absent fields leave the bucket untouched.
    pub fn apply(&mut self, patch: &DayMetricsPatch) {
        if let Some(clicks) = patch.clicks {
            self.clicks += clicks;
        }
        if let Some(signups) = patch.signups {
            self.signups += signups;
        }
        if let Some(customers) = patch.customers {
            self.customers += customers;
        }
        if let Some(earnings) = patch.earnings {
            self.earnings += earnings;
        }
    }

    pub fn is_zero(&self) -> bool {
        self.clicks == 0 && self.signups == 0 && self.customers == 0 && self.earnings == 0.0
    }
}

/// Partial update for a day bucket. Provided fields are added to the
/// existing values; an all-empty patch just ensures the bucket exists.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DayMetricsPatch {
    pub clicks: Option<i64>,
    pub signups: Option<i64>,
    pub customers: Option<i64>,
    pub earnings: Option<f64>,
}

/// The whole per-user report row: the sparse day map plus auxiliary maps
/// that the aggregator passes through untouched.
///
/// One row per user, keyed by `user_id`. Buckets are created lazily on
/// first write (or by the daily seeding job) and never deleted in normal
/// operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub user_id: String,

    /// Sparse `YYYY-MM-DD` → metrics map.
    #[serde(default)]
    pub daily: BTreeMap<String, DayMetrics>,

    /// Opaque link stats, passed through as-is.
    #[serde(default)]
    pub links: serde_json::Map<String, serde_json::Value>,

    /// Opaque sub-id stats, passed through as-is.
    #[serde(default)]
    pub sub_ids: serde_json::Map<String, serde_json::Value>,

    /// Opaque traffic source stats, passed through as-is.
    #[serde(default)]
    pub traffic_sources: serde_json::Map<String, serde_json::Value>,

    /// Unix timestamp of the last write.
    pub updated_at: i64,

    /// Monotonic version stamp, compared-and-swapped on write so
    /// concurrent read-modify-write cycles cannot silently drop an
    /// increment. `0` marks a document that has never been stored.
    #[serde(default)]
    pub version: i64,
}

impl ReportDocument {
    pub fn empty(user_id: &str, updated_at: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            daily: BTreeMap::new(),
            links: serde_json::Map::new(),
            sub_ids: serde_json::Map::new(),
            traffic_sources: serde_json::Map::new(),
            updated_at,
            version: 0,
        }
    }
}
