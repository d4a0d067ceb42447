use crate::models::{Booking, BookingEvent, BookingEventKind};
use crate::state::AppState;

/// Tells subscribers which booking to refetch. Nobody listening is fine.
pub fn publish(state: &AppState, booking: &Booking, kind: BookingEventKind) {
    let event = BookingEvent {
        booking_id: booking.id.clone(),
        kind,
        status: booking.status,
        version: booking.version,
    };
    if state.events_tx.send(event).is_err() {
        tracing::trace!(booking_id = %booking.id, "no event subscribers");
    }
}
