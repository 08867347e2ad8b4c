use crate::models::{Profile, ReportDocument};
use anyhow::Result;
use async_trait::async_trait;

/// Operations the rest of the system needs from the remote relational
/// store. Every document is a single row keyed by user id; no cross-table
/// transactions are required.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Trivial existence query used by the health monitor.
    async fn probe(&self) -> Result<()>;

    /// Fetch a user's report document. `None` means no report yet, which
    /// is a normal outcome for a young account, not an error.
    async fn fetch_report(&self, user_id: &str) -> Result<Option<ReportDocument>>;

    /// Write a whole report document if its stored version still equals
    /// `doc.version` (`0` inserts a fresh row). Returns `false` when a
    /// concurrent writer got there first; the caller re-reads and retries.
    async fn put_report(&self, doc: &ReportDocument) -> Result<bool>;

    /// Fetch a user's profile row, `None` when absent.
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>>;

    /// Insert a profile if absent, returning the stored row either way. A
    /// concurrent insert for the same user keeps the first row's code.
    async fn upsert_profile(
        &self,
        user_id: &str,
        email: Option<&str>,
        referral_code: &str,
    ) -> Result<Profile>;

    /// All known user ids, for the daily seeding batch.
    async fn list_user_ids(&self) -> Result<Vec<String>>;
}
