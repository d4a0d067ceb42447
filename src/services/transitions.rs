//! Booking status state machine.
//!
//! Callers must hold the booking under the per-booking write serialization
//! described in `services::bookings`; the functions here only judge a
//! snapshot.

use chrono::{DateTime, Utc};

use crate::errors::BookingError;
use crate::models::{Actor, ActorRole, Booking, BookingStatus, HistoryEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Unchanged,
    Changed {
        from: BookingStatus,
        to: BookingStatus,
    },
}

const STAFF: &[ActorRole] = &[ActorRole::Host, ActorRole::Admin];
const ANY_PARTY: &[ActorRole] = &[ActorRole::Client, ActorRole::Host, ActorRole::Admin];
const CLIENT_OR_ADMIN: &[ActorRole] = &[ActorRole::Client, ActorRole::Admin];
const SYSTEM_OR_ADMIN: &[ActorRole] = &[ActorRole::System, ActorRole::Admin];
const SYSTEM_ONLY: &[ActorRole] = &[ActorRole::System];

/// Roles permitted on each legal edge, `None` for every edge not in the table.
pub fn permitted_roles(from: BookingStatus, to: BookingStatus) -> Option<&'static [ActorRole]> {
    use BookingStatus::*;

    match (from, to) {
        (Pending, Confirmed) | (Pending, Rejected) => Some(STAFF),
        (Pending, Cancelled) => Some(ANY_PARTY),
        (PaymentPending, Confirmed) => Some(SYSTEM_OR_ADMIN),
        (PaymentPending, Cancelled) => Some(CLIENT_OR_ADMIN),
        (Confirmed, Cancelled) => Some(ANY_PARTY),
        (Confirmed, RefundPending) => Some(STAFF),
        (RefundPending, Refunded) => Some(SYSTEM_ONLY),
        _ => None,
    }
}

pub fn check(
    from: BookingStatus,
    to: BookingStatus,
    role: ActorRole,
) -> Result<TransitionOutcome, BookingError> {
    if from == to {
        return Ok(TransitionOutcome::Unchanged);
    }
    if from.is_terminal() {
        return Err(BookingError::TerminalState { status: from });
    }

    let roles = permitted_roles(from, to).ok_or(BookingError::IllegalTransition { from, to })?;
    if !roles.contains(&role) {
        return Err(BookingError::UnauthorizedActor {
            role,
            action: format!("move a booking from {from} to {to}"),
        });
    }

    Ok(TransitionOutcome::Changed { from, to })
}

/// Moves `booking` to `requested`, appending exactly one history entry when
/// the status actually changes.
pub fn transition(
    mut booking: Booking,
    requested: BookingStatus,
    actor: &Actor,
    notify_client: bool,
    at: DateTime<Utc>,
) -> Result<Booking, BookingError> {
    match check(booking.status, requested, actor.role)? {
        TransitionOutcome::Unchanged => Ok(booking),
        TransitionOutcome::Changed { from, to } => {
            booking.status = to;
            let entry = HistoryEntry {
                seq: booking.next_history_seq(),
                booking_id: booking.id.clone(),
                timestamp: at,
                actor_id: actor.id.clone(),
                change_summary: format!("status: {from} → {to}"),
                price_delta: 0,
                notified_client: notify_client,
            };
            booking.record(entry);
            tracing::debug!(booking_id = %booking.id, %from, %to, actor = %actor.id, "status changed");
            Ok(booking)
        }
    }
}
