use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RefundRecord {
    pub id: String,
    pub booking_id: String,
    pub amount: i64,
    pub reason: String,
    pub processed_at: DateTime<Utc>,
    pub processed_by: String,
}
