use chrono::{DateTime, Utc};
use serde::Serialize;

/// One audited mutation of a booking. Written once, never changed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub seq: i64,
    pub booking_id: String,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub change_summary: String,
    pub price_delta: i64,
    pub notified_client: bool,
}
