pub mod webhook;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Booking, BookingStatus};
use crate::state::AppState;

/// What the client is told after a mutation that asked for notification.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClientNotice {
    pub booking_id: String,
    pub client_id: String,
    pub status: BookingStatus,
    pub total_price: i64,
    pub summary: String,
}

impl ClientNotice {
    pub fn for_booking(booking: &Booking) -> Self {
        let summary = booking
            .history()
            .last()
            .map(|e| e.change_summary.clone())
            .unwrap_or_else(|| format!("booking is {}", booking.status));
        Self {
            booking_id: booking.id.clone(),
            client_id: booking.client_id.clone(),
            status: booking.status,
            total_price: booking.total_price,
            summary,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &ClientNotice) -> anyhow::Result<()>;
}

/// Used when no delivery endpoint is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &ClientNotice) -> anyhow::Result<()> {
        tracing::info!(
            booking_id = %notice.booking_id,
            client_id = %notice.client_id,
            status = %notice.status,
            summary = %notice.summary,
            "client notification"
        );
        Ok(())
    }
}

/// Delivery happens after commit; failures are logged, not returned.
pub async fn notify_client(state: &AppState, booking: &Booking) {
    let notice = ClientNotice::for_booking(booking);
    if let Err(e) = state.notifier.notify(&notice).await {
        tracing::error!(error = %e, booking_id = %booking.id, "failed to notify client");
    }
}
