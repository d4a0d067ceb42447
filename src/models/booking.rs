use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::HistoryEntry;

#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    pub id: String,
    pub location_id: String,
    pub client_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub guest_count: i64,
    pub status: BookingStatus,
    /// Smallest currency unit (cents).
    pub total_price: i64,
    /// Host-entered flat surcharge, already included in `total_price`.
    pub additional_price: i64,
    pub selected_addons: BTreeSet<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub(crate) edit_history: Vec<HistoryEntry>,
}

impl Booking {
    pub fn history(&self) -> &[HistoryEntry] {
        &self.edit_history
    }

    pub(crate) fn next_history_seq(&self) -> i64 {
        self.edit_history.last().map(|e| e.seq + 1).unwrap_or(1)
    }

    pub(crate) fn record(&mut self, entry: HistoryEntry) {
        self.updated_at = entry.timestamp;
        self.edit_history.push(entry);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    PaymentPending,
    Confirmed,
    Rejected,
    Cancelled,
    RefundPending,
    Refunded,
    Completed,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 8] = [
        BookingStatus::Pending,
        BookingStatus::PaymentPending,
        BookingStatus::Confirmed,
        BookingStatus::Rejected,
        BookingStatus::Cancelled,
        BookingStatus::RefundPending,
        BookingStatus::Refunded,
        BookingStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::PaymentPending => "payment_pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::RefundPending => "refund_pending",
            BookingStatus::Refunded => "refunded",
            BookingStatus::Completed => "completed",
        }
    }

    /// No outgoing transitions are accepted from these states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Cancelled
                | BookingStatus::Rejected
                | BookingStatus::Refunded
                | BookingStatus::Completed
        )
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid booking status: {s}"))
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
