pub mod auth;
pub mod bookings;
pub mod events;
pub mod health;
pub mod locations;
pub mod payments;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/locations",
            post(locations::create_location).get(locations::list_locations),
        )
        .route("/api/locations/:id", get(locations::get_location))
        .route("/api/locations/:id/addons", post(locations::add_addon))
        .route("/api/locations/:id/quote", post(locations::quote))
        .route(
            "/api/bookings",
            post(bookings::create_booking).get(bookings::list_bookings),
        )
        .route(
            "/api/bookings/:id",
            get(bookings::get_booking).patch(bookings::update_booking),
        )
        .route("/api/bookings/:id/refund", post(bookings::issue_refund))
        .route("/api/bookings/:id/refunds", get(bookings::list_refunds))
        .route("/api/bookings/:id/history", get(bookings::get_history))
        .route("/api/events", get(events::events_stream))
        .route("/webhooks/payments", post(payments::payment_webhook))
        .with_state(state)
}
