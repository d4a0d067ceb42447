use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{Booking, BookingEventKind, HistoryEntry, RefundRecord};
use crate::services::bookings::{self, BookingUpdate, ListQuery, Mutation, NewBooking};
use crate::services::refunds::RefundRequest;
use crate::services::{events, notifications};
use crate::state::AppState;

use super::auth::authenticate;

/// Broadcasts the invalidation event and, when asked for, notifies the client.
async fn after_commit(state: &AppState, mutation: &Mutation, kind: BookingEventKind) {
    if mutation.changed {
        events::publish(state, &mutation.booking, kind);
    }
    if mutation.notify_client {
        notifications::notify_client(state, &mutation.booking).await;
    }
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let actor = authenticate(&headers, &state)?;

    let booking = {
        let mut db = state.db()?;
        bookings::create_booking(&mut db, &actor, body)?
    };
    events::publish(&state, &booking, BookingEventKind::Created);

    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let actor = authenticate(&headers, &state)?;

    let bookings = {
        let db = state.db()?;
        bookings::list_bookings(&db, &actor, &query)?
    };

    Ok(Json(bookings))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let actor = authenticate(&headers, &state)?;

    let booking = {
        let db = state.db()?;
        bookings::get_booking(&db, &id, &actor)?
    };

    Ok(Json(booking))
}

// PATCH /api/bookings/:id
pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<BookingUpdate>,
) -> Result<Json<Booking>, AppError> {
    let actor = authenticate(&headers, &state)?;

    let mutation = {
        let mut db = state.db()?;
        bookings::update_booking(&mut db, &id, &actor, body)?
    };
    after_commit(&state, &mutation, BookingEventKind::Updated).await;

    Ok(Json(mutation.booking))
}

// POST /api/bookings/:id/refund
#[derive(Serialize)]
pub struct RefundResponse {
    booking: Booking,
    refund: RefundRecord,
}

pub async fn issue_refund(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RefundRequest>,
) -> Result<(StatusCode, Json<RefundResponse>), AppError> {
    let actor = authenticate(&headers, &state)?;

    let (mutation, refund) = {
        let mut db = state.db()?;
        bookings::issue_refund(&mut db, &id, &actor, body)?
    };
    after_commit(&state, &mutation, BookingEventKind::Refunded).await;

    Ok((
        StatusCode::CREATED,
        Json(RefundResponse {
            booking: mutation.booking,
            refund,
        }),
    ))
}

// GET /api/bookings/:id/refunds
pub async fn list_refunds(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<RefundRecord>>, AppError> {
    let actor = authenticate(&headers, &state)?;

    let refunds = {
        let db = state.db()?;
        bookings::booking_refunds(&db, &id, &actor)?
    };

    Ok(Json(refunds))
}

// GET /api/bookings/:id/history
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let actor = authenticate(&headers, &state)?;

    let entries = {
        let db = state.db()?;
        bookings::booking_history(&db, &id, &actor)?
    };

    Ok(Json(entries))
}
