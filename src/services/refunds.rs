//! Partial and full refunds against a booking.
//!
//! The balance check is only sound when `prior` was read in the same write
//! transaction that stores the new record.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::BookingError;
use crate::models::{Actor, Booking, BookingStatus, HistoryEntry, RefundRecord};
use crate::services::transitions;

#[derive(Debug, Clone, Deserialize)]
pub struct RefundRequest {
    pub amount: i64,
    pub reason: String,
    #[serde(default)]
    pub notify_client: bool,
}

pub fn refunded_total(prior: &[RefundRecord]) -> i64 {
    prior.iter().map(|r| r.amount).sum()
}

pub fn refundable_balance(booking: &Booking, prior: &[RefundRecord]) -> i64 {
    (booking.total_price - refunded_total(prior)).max(0)
}

pub fn validate(
    booking: &Booking,
    prior: &[RefundRecord],
    request: &RefundRequest,
    actor: &Actor,
) -> Result<(), BookingError> {
    if request.amount <= 0 {
        return Err(BookingError::InvalidRefundAmount(request.amount));
    }
    if request.reason.trim().is_empty() {
        return Err(BookingError::EmptyReason);
    }

    let remaining = refundable_balance(booking, prior);
    if request.amount > remaining {
        return Err(BookingError::RefundExceedsBalance {
            requested: request.amount,
            remaining,
        });
    }

    if !matches!(
        booking.status,
        BookingStatus::Confirmed | BookingStatus::RefundPending
    ) {
        return Err(BookingError::InvalidBookingState {
            status: booking.status,
            operation: "refund",
        });
    }

    if !actor.role.is_staff() {
        return Err(BookingError::UnauthorizedActor {
            role: actor.role,
            action: "issue refunds".to_string(),
        });
    }

    Ok(())
}

/// Validates and records one refund. A confirmed booking first moves to
/// `refund_pending`; once the balance is exhausted it moves on to `refunded`.
pub fn process(
    booking: Booking,
    prior: &[RefundRecord],
    request: &RefundRequest,
    actor: &Actor,
    at: DateTime<Utc>,
) -> Result<(Booking, RefundRecord), BookingError> {
    validate(&booking, prior, request, actor)?;

    let remaining = refundable_balance(&booking, prior);
    let reason = request.reason.trim().to_string();

    let mut booking = transitions::transition(
        booking,
        BookingStatus::RefundPending,
        actor,
        request.notify_client,
        at,
    )?;

    let record = RefundRecord {
        id: uuid::Uuid::new_v4().to_string(),
        booking_id: booking.id.clone(),
        amount: request.amount,
        reason: reason.clone(),
        processed_at: at,
        processed_by: actor.id.clone(),
    };

    let entry = HistoryEntry {
        seq: booking.next_history_seq(),
        booking_id: booking.id.clone(),
        timestamp: at,
        actor_id: actor.id.clone(),
        change_summary: format!("refund of {} issued: {reason}", request.amount),
        price_delta: 0,
        notified_client: request.notify_client,
    };
    booking.record(entry);

    if request.amount == remaining {
        booking = transitions::transition(
            booking,
            BookingStatus::Refunded,
            &Actor::system(),
            request.notify_client,
            at,
        )?;
    }

    tracing::info!(
        booking_id = %booking.id,
        amount = request.amount,
        remaining = remaining - request.amount,
        status = %booking.status,
        "refund recorded"
    );

    Ok((booking, record))
}
