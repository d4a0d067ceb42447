//! Append-only audit trail of booking mutations, stored in `booking_history`.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::{AppError, BookingError};
use crate::models::{Booking, HistoryEntry};

pub struct NewEntry<'a> {
    pub booking_id: &'a str,
    pub actor_id: &'a str,
    pub summary: &'a str,
    pub price_delta: i64,
    pub notified_client: bool,
}

pub fn append(
    conn: &Connection,
    entry: NewEntry<'_>,
    at: DateTime<Utc>,
) -> Result<HistoryEntry, AppError> {
    if !queries::booking_exists(conn, entry.booking_id)? {
        return Err(BookingError::BookingNotFound(entry.booking_id.to_string()).into());
    }

    let written = HistoryEntry {
        seq: queries::max_history_seq(conn, entry.booking_id)? + 1,
        booking_id: entry.booking_id.to_string(),
        timestamp: at,
        actor_id: entry.actor_id.to_string(),
        change_summary: entry.summary.to_string(),
        price_delta: entry.price_delta,
        notified_client: entry.notified_client,
    };
    queries::insert_history_entry(conn, &written)?;
    Ok(written)
}

/// Entries in insertion order.
pub fn entries(conn: &Connection, booking_id: &str) -> Result<Vec<HistoryEntry>, AppError> {
    if !queries::booking_exists(conn, booking_id)? {
        return Err(BookingError::BookingNotFound(booking_id.to_string()).into());
    }
    Ok(queries::get_history(conn, booking_id)?)
}

/// Stores the entries recorded on `booking` since it was loaded.
pub fn persist_new(conn: &Connection, booking: &Booking) -> Result<usize, AppError> {
    let stored = queries::max_history_seq(conn, &booking.id)?;
    let mut written = 0;
    for entry in booking.history().iter().filter(|e| e.seq > stored) {
        append(
            conn,
            NewEntry {
                booking_id: &entry.booking_id,
                actor_id: &entry.actor_id,
                summary: &entry.change_summary,
                price_delta: entry.price_delta,
                notified_client: entry.notified_client,
            },
            entry.timestamp,
        )?;
        written += 1;
    }
    Ok(written)
}
