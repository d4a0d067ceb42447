use serde::{Deserialize, Serialize};

use super::BookingStatus;

/// Broadcast after a committed mutation so subscribers can drop cached
/// copies of the booking.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingEvent {
    pub booking_id: String,
    pub kind: BookingEventKind,
    pub status: BookingStatus,
    pub version: i64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    Created,
    Updated,
    Refunded,
}
