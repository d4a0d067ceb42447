//! Booking mutations end to end: load, authorize, validate, reprice,
//! record history, persist.
//!
//! Every mutation runs in a single IMMEDIATE transaction and writes back with
//! an optimistic version check, so two requests racing on the same booking
//! (a client cancelling while the host confirms) cannot both commit, and
//! refund balances are computed against the refunds visible to the writer.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Deserialize;

use crate::db::queries::{self, BookingFilter};
use crate::errors::{AppError, BookingError};
use crate::models::{Actor, ActorRole, Booking, BookingStatus, HistoryEntry, Location, RefundRecord};
use crate::services::pricing::{self, PriceInputs};
use crate::services::refunds::{self, RefundRequest};
use crate::services::{history, transitions};

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub location_id: String,
    /// Required when an admin books on behalf of a client.
    pub client_id: Option<String>,
    pub start_date: String,
    pub end_date: String,
    #[serde(default = "default_guest_count")]
    pub guest_count: i64,
    #[serde(default)]
    pub selected_addons: BTreeSet<String>,
}

fn default_guest_count() -> i64 {
    1
}

/// Body of `PATCH /api/bookings/:id`. Field edits are applied before the
/// optional status change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingUpdate {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub guest_count: Option<i64>,
    pub selected_addons: Option<BTreeSet<String>>,
    pub additional_price: Option<i64>,
    pub status: Option<BookingStatus>,
    #[serde(default)]
    pub notify_client: bool,
    pub expected_version: Option<i64>,
}

impl BookingUpdate {
    fn has_field_edits(&self) -> bool {
        self.start_date.is_some()
            || self.end_date.is_some()
            || self.guest_count.is_some()
            || self.selected_addons.is_some()
            || self.additional_price.is_some()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub enum PaymentEvent {
    #[serde(rename = "payment.captured")]
    PaymentCaptured,
    #[serde(rename = "refund.completed")]
    RefundCompleted,
}

impl PaymentEvent {
    fn target_status(&self) -> BookingStatus {
        match self {
            PaymentEvent::PaymentCaptured => BookingStatus::Confirmed,
            PaymentEvent::RefundCompleted => BookingStatus::Refunded,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Mutation {
    pub booking: Booking,
    /// False when the request matched the stored state and nothing was written.
    pub changed: bool,
    pub notify_client: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<BookingStatus>,
    pub location_id: Option<String>,
    pub limit: Option<i64>,
}

/// Clients may only touch their own bookings, hosts only bookings at their
/// own locations.
pub fn authorize(booking: &Booking, location: &Location, actor: &Actor) -> Result<(), BookingError> {
    let allowed = match actor.role {
        ActorRole::Client => booking.client_id == actor.id,
        ActorRole::Host => location.host_id == actor.id,
        ActorRole::Admin | ActorRole::System => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(BookingError::UnauthorizedActor {
            role: actor.role,
            action: format!("access booking {}", booking.id),
        })
    }
}

/// Applies schedule/guest/add-on/surcharge edits and reprices the booking.
/// Records one history entry listing every changed field, or nothing when
/// the edit matches the current values.
pub fn apply_edit(
    mut booking: Booking,
    location: &Location,
    update: &BookingUpdate,
    actor: &Actor,
    at: DateTime<Utc>,
) -> Result<Booking, BookingError> {
    if !update.has_field_edits() {
        return Ok(booking);
    }
    if !actor.role.is_staff() {
        return Err(BookingError::UnauthorizedActor {
            role: actor.role,
            action: "edit booking details".to_string(),
        });
    }
    if !matches!(
        booking.status,
        BookingStatus::Pending | BookingStatus::PaymentPending | BookingStatus::Confirmed
    ) {
        return Err(BookingError::InvalidBookingState {
            status: booking.status,
            operation: "edit",
        });
    }

    let start = match &update.start_date {
        Some(raw) => pricing::parse_timestamp(raw)?,
        None => booking.start_date,
    };
    let end = match &update.end_date {
        Some(raw) => pricing::parse_timestamp(raw)?,
        None => booking.end_date,
    };
    let end = pricing::effective_end(start, end)?;
    let guest_count = update.guest_count.unwrap_or(booking.guest_count);
    let selected = update
        .selected_addons
        .clone()
        .unwrap_or_else(|| booking.selected_addons.clone());
    let additional_price = update.additional_price.unwrap_or(booking.additional_price);

    let addons = pricing::resolve_addons(location, &selected)?;
    let price = pricing::calculate(&PriceInputs::for_location(
        location,
        start,
        end,
        guest_count,
        &addons,
        additional_price,
    ))?;

    let mut changes = vec![];
    if start != booking.start_date {
        changes.push(format!("start: {} → {}", iso(&booking.start_date), iso(&start)));
    }
    if end != booking.end_date {
        changes.push(format!("end: {} → {}", iso(&booking.end_date), iso(&end)));
    }
    if guest_count != booking.guest_count {
        changes.push(format!("guests: {} → {guest_count}", booking.guest_count));
    }
    if selected != booking.selected_addons {
        changes.push(format!(
            "add-ons: [{}] → [{}]",
            join(&booking.selected_addons),
            join(&selected)
        ));
    }
    if additional_price != booking.additional_price {
        changes.push(format!(
            "additional price: {} → {additional_price}",
            booking.additional_price
        ));
    }
    if changes.is_empty() {
        return Ok(booking);
    }

    let price_delta = price.total - booking.total_price;
    if price_delta != 0 {
        changes.push(format!("total: {} → {}", booking.total_price, price.total));
    }

    booking.start_date = start;
    booking.end_date = end;
    booking.guest_count = guest_count;
    booking.selected_addons = selected;
    booking.additional_price = additional_price;
    booking.total_price = price.total;

    let entry = HistoryEntry {
        seq: booking.next_history_seq(),
        booking_id: booking.id.clone(),
        timestamp: at,
        actor_id: actor.id.clone(),
        change_summary: changes.join("; "),
        price_delta,
        notified_client: update.notify_client,
    };
    booking.record(entry);
    Ok(booking)
}

pub fn create_booking(
    conn: &mut Connection,
    actor: &Actor,
    request: NewBooking,
) -> Result<Booking, AppError> {
    let client_id = match actor.role {
        ActorRole::Client => match request.client_id.as_deref() {
            Some(id) if id != actor.id => {
                return Err(BookingError::UnauthorizedActor {
                    role: actor.role,
                    action: "book on behalf of another client".to_string(),
                }
                .into())
            }
            _ => actor.id.clone(),
        },
        ActorRole::Admin => request
            .client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                AppError::BadRequest("client_id is required when booking for a client".into())
            })?,
        ActorRole::Host | ActorRole::System => {
            return Err(BookingError::UnauthorizedActor {
                role: actor.role,
                action: "create bookings".to_string(),
            }
            .into())
        }
    };

    let tx = begin(conn)?;
    let location = load_location(&tx, &request.location_id)?;

    let start = pricing::parse_timestamp(&request.start_date)?;
    let end = pricing::effective_end(start, pricing::parse_timestamp(&request.end_date)?)?;
    let addons = pricing::resolve_addons(&location, &request.selected_addons)?;
    let price = pricing::calculate(&PriceInputs::for_location(
        &location,
        start,
        end,
        request.guest_count,
        &addons,
        0,
    ))?;

    let status = if location.instant_book {
        BookingStatus::PaymentPending
    } else {
        BookingStatus::Pending
    };
    let now = Utc::now();
    let mut booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        location_id: location.id.clone(),
        client_id,
        start_date: start,
        end_date: end,
        guest_count: request.guest_count,
        status,
        total_price: price.total,
        additional_price: 0,
        selected_addons: request.selected_addons,
        version: 1,
        created_at: now,
        updated_at: now,
        edit_history: vec![],
    };
    let entry = HistoryEntry {
        seq: booking.next_history_seq(),
        booking_id: booking.id.clone(),
        timestamp: now,
        actor_id: actor.id.clone(),
        change_summary: format!("booking created ({status})"),
        price_delta: price.total,
        notified_client: false,
    };
    booking.record(entry);

    queries::create_booking(&tx, &booking)?;
    history::persist_new(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        location_id = %booking.location_id,
        status = %booking.status,
        total_price = booking.total_price,
        "booking created"
    );
    Ok(booking)
}

pub fn update_booking(
    conn: &mut Connection,
    id: &str,
    actor: &Actor,
    update: BookingUpdate,
) -> Result<Mutation, AppError> {
    let tx = begin(conn)?;
    let booking = load_booking(&tx, id)?;
    let location = load_location(&tx, &booking.location_id)?;
    authorize(&booking, &location, actor)?;

    if let Some(expected) = update.expected_version {
        if expected != booking.version {
            return Err(AppError::Conflict(booking.id));
        }
    }

    let now = Utc::now();
    let recorded_before = booking.history().len();
    let mut booking = apply_edit(booking, &location, &update, actor, now)?;
    if let Some(status) = update.status {
        booking = transitions::transition(booking, status, actor, update.notify_client, now)?;
    }

    let changed = booking.history().len() > recorded_before;
    if changed {
        save(&tx, &mut booking)?;
        tx.commit()?;
        tracing::info!(booking_id = %booking.id, status = %booking.status, version = booking.version, "booking updated");
    }

    Ok(Mutation {
        notify_client: update.notify_client && changed,
        booking,
        changed,
    })
}

pub fn issue_refund(
    conn: &mut Connection,
    id: &str,
    actor: &Actor,
    request: RefundRequest,
) -> Result<(Mutation, RefundRecord), AppError> {
    let tx = begin(conn)?;
    let booking = load_booking(&tx, id)?;
    let location = load_location(&tx, &booking.location_id)?;
    authorize(&booking, &location, actor)?;

    let prior = queries::get_refunds_for_booking(&tx, id)?;
    let (mut booking, record) = refunds::process(booking, &prior, &request, actor, Utc::now())?;

    save(&tx, &mut booking)?;
    queries::insert_refund(&tx, &record)?;
    tx.commit()?;

    Ok((
        Mutation {
            booking,
            changed: true,
            notify_client: request.notify_client,
        },
        record,
    ))
}

/// Payment provider callbacks act as the `system` actor.
pub fn apply_payment_event(
    conn: &mut Connection,
    id: &str,
    event: PaymentEvent,
) -> Result<Mutation, AppError> {
    let tx = begin(conn)?;
    let booking = load_booking(&tx, id)?;
    let recorded_before = booking.history().len();

    let mut booking = transitions::transition(
        booking,
        event.target_status(),
        &Actor::system(),
        true,
        Utc::now(),
    )?;

    let changed = booking.history().len() > recorded_before;
    if changed {
        save(&tx, &mut booking)?;
        tx.commit()?;
    }
    tracing::info!(booking_id = %booking.id, ?event, changed, "payment event applied");

    Ok(Mutation {
        booking,
        changed,
        notify_client: changed,
    })
}

pub fn get_booking(conn: &Connection, id: &str, actor: &Actor) -> Result<Booking, AppError> {
    let booking = load_booking(conn, id)?;
    let location = load_location(conn, &booking.location_id)?;
    authorize(&booking, &location, actor)?;
    Ok(booking)
}

pub fn list_bookings(
    conn: &Connection,
    actor: &Actor,
    query: &ListQuery,
) -> Result<Vec<Booking>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let mut filter = BookingFilter {
        status: query.status,
        location_id: query.location_id.as_deref(),
        limit,
        ..Default::default()
    };
    match actor.role {
        ActorRole::Client => filter.client_id = Some(actor.id.as_str()),
        ActorRole::Host => filter.host_id = Some(actor.id.as_str()),
        ActorRole::Admin | ActorRole::System => {}
    }
    Ok(queries::list_bookings(conn, &filter)?)
}

pub fn booking_history(
    conn: &Connection,
    id: &str,
    actor: &Actor,
) -> Result<Vec<HistoryEntry>, AppError> {
    get_booking(conn, id, actor)?;
    history::entries(conn, id)
}

pub fn booking_refunds(
    conn: &Connection,
    id: &str,
    actor: &Actor,
) -> Result<Vec<RefundRecord>, AppError> {
    get_booking(conn, id, actor)?;
    Ok(queries::get_refunds_for_booking(conn, id)?)
}

fn begin(conn: &mut Connection) -> Result<Transaction<'_>, AppError> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

fn load_booking(conn: &Connection, id: &str) -> Result<Booking, AppError> {
    queries::get_booking_by_id(conn, id)?
        .ok_or_else(|| BookingError::BookingNotFound(id.to_string()).into())
}

fn load_location(conn: &Connection, id: &str) -> Result<Location, AppError> {
    queries::get_location(conn, id)?
        .ok_or_else(|| BookingError::LocationNotFound(id.to_string()).into())
}

/// Version-checked write plus the history entries recorded since load.
fn save(conn: &Connection, booking: &mut Booking) -> Result<(), AppError> {
    if !queries::update_booking(conn, booking)? {
        return Err(AppError::Conflict(booking.id.clone()));
    }
    history::persist_new(conn, booking)?;
    booking.version += 1;
    Ok(())
}

fn iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn join(ids: &BTreeSet<String>) -> String {
    ids.iter().cloned().collect::<Vec<_>>().join(", ")
}
