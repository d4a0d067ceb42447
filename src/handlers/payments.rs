use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;

use crate::errors::AppError;
use crate::models::BookingEventKind;
use crate::services::bookings::{self, PaymentEvent};
use crate::services::{events, notifications};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentNotification {
    pub event: PaymentEvent,
    pub booking_id: String,
}

/// `X-Signature` carries base64(HMAC-SHA1(secret, raw body)).
fn validate_signature(secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature) else {
        return false;
    };
    let mut mac = match Hmac::<Sha1>::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

fn forbidden(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({"error": "forbidden", "message": message})),
    )
        .into_response()
}

// POST /webhooks/payments
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Skip signature validation when no secret is configured (dev mode)
    if !state.config.payment_webhook_secret.is_empty() {
        let signature = headers
            .get("x-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if signature.is_empty() {
            tracing::warn!("missing X-Signature header");
            return forbidden("missing signature");
        }
        if !validate_signature(&state.config.payment_webhook_secret, signature, &body) {
            tracing::warn!("invalid payment webhook signature");
            return forbidden("invalid signature");
        }
    }

    let notification: PaymentNotification = match serde_json::from_slice(&body) {
        Ok(n) => n,
        Err(e) => return AppError::BadRequest(format!("invalid payload: {e}")).into_response(),
    };
    tracing::info!(
        booking_id = %notification.booking_id,
        event = ?notification.event,
        "payment webhook received"
    );

    let result = state.db().and_then(|mut db| {
        bookings::apply_payment_event(&mut db, &notification.booking_id, notification.event)
    });
    let mutation = match result {
        Ok(m) => m,
        Err(e) => return e.into_response(),
    };

    if mutation.changed {
        let kind = match notification.event {
            PaymentEvent::PaymentCaptured => BookingEventKind::Updated,
            PaymentEvent::RefundCompleted => BookingEventKind::Refunded,
        };
        events::publish(&state, &mutation.booking, kind);
    }
    if mutation.notify_client {
        notifications::notify_client(&state, &mutation.booking).await;
    }

    Json(serde_json::json!({
        "booking_id": mutation.booking.id,
        "status": mutation.booking.status,
        "changed": mutation.changed,
    }))
    .into_response()
}
