use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-user account row holding the referral code shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub user_id: String,
    pub email: Option<String>,
    pub referral_code: String,
    pub created_at: i64,
}
