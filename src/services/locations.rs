use std::collections::BTreeSet;

use rusqlite::Connection;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::{AppError, BookingError};
use crate::models::{Actor, ActorRole, Addon, Location, PriceUnit};
use crate::services::pricing::{self, PriceBreakdown, PriceInputs};

#[derive(Debug, Clone, Deserialize)]
pub struct NewLocation {
    /// Required when an admin lists a location for a host.
    pub host_id: Option<String>,
    pub name: String,
    pub base_price_per_hour: i64,
    #[serde(default)]
    pub incremental_rate_per_guest: i64,
    #[serde(default)]
    pub instant_book: bool,
    #[serde(default)]
    pub addons: Vec<NewAddon>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAddon {
    pub id: Option<String>,
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub price_unit: PriceUnit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub start_date: String,
    pub end_date: String,
    #[serde(default = "one")]
    pub guest_count: i64,
    #[serde(default)]
    pub selected_addons: BTreeSet<String>,
    #[serde(default)]
    pub additional_price: i64,
}

fn one() -> i64 {
    1
}

pub fn create_location(
    conn: &Connection,
    actor: &Actor,
    request: NewLocation,
) -> Result<Location, AppError> {
    let host_id = match actor.role {
        ActorRole::Host => actor.id.clone(),
        ActorRole::Admin => request
            .host_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("host_id is required".into()))?,
        ActorRole::Client | ActorRole::System => {
            return Err(BookingError::UnauthorizedActor {
                role: actor.role,
                action: "create locations".to_string(),
            }
            .into())
        }
    };
    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }
    if request.base_price_per_hour < 0 {
        return Err(BookingError::NegativeAmount {
            field: "base_price_per_hour",
        }
        .into());
    }
    if request.incremental_rate_per_guest < 0 {
        return Err(BookingError::NegativeAmount {
            field: "incremental_rate_per_guest",
        }
        .into());
    }

    let id = uuid::Uuid::new_v4().to_string();
    let addons = request
        .addons
        .into_iter()
        .map(|a| build_addon(&id, a))
        .collect::<Result<Vec<_>, _>>()?;

    let location = Location {
        id,
        host_id,
        name: request.name.trim().to_string(),
        base_price_per_hour: request.base_price_per_hour,
        incremental_rate_per_guest: request.incremental_rate_per_guest,
        instant_book: request.instant_book,
        addons,
    };
    queries::create_location(conn, &location)?;

    tracing::info!(location_id = %location.id, host_id = %location.host_id, "location created");
    Ok(location)
}

pub fn add_addon(
    conn: &Connection,
    actor: &Actor,
    location_id: &str,
    request: NewAddon,
) -> Result<Addon, AppError> {
    let location = get_location(conn, location_id)?;
    let owns = match actor.role {
        ActorRole::Host => location.host_id == actor.id,
        ActorRole::Admin => true,
        ActorRole::Client | ActorRole::System => false,
    };
    if !owns {
        return Err(BookingError::UnauthorizedActor {
            role: actor.role,
            action: format!("change add-ons of location {location_id}"),
        }
        .into());
    }

    let addon = build_addon(location_id, request)?;
    if location.addons.iter().any(|a| a.id == addon.id) {
        return Err(AppError::BadRequest(format!("add-on {} already exists", addon.id)));
    }
    queries::create_addon(conn, &addon)?;
    Ok(addon)
}

pub fn get_location(conn: &Connection, id: &str) -> Result<Location, AppError> {
    queries::get_location(conn, id)?
        .ok_or_else(|| BookingError::LocationNotFound(id.to_string()).into())
}

pub fn list_locations(conn: &Connection, actor: &Actor, limit: i64) -> Result<Vec<Location>, AppError> {
    let host_filter = match actor.role {
        ActorRole::Host => Some(actor.id.as_str()),
        _ => None,
    };
    Ok(queries::list_locations(conn, host_filter, limit.clamp(1, 500))?)
}

/// Prices a prospective booking without storing anything.
pub fn quote(
    conn: &Connection,
    location_id: &str,
    request: &QuoteRequest,
) -> Result<PriceBreakdown, AppError> {
    let location = get_location(conn, location_id)?;
    let start = pricing::parse_timestamp(&request.start_date)?;
    let end = pricing::parse_timestamp(&request.end_date)?;
    let addons = pricing::resolve_addons(&location, &request.selected_addons)?;
    Ok(pricing::calculate(&PriceInputs::for_location(
        &location,
        start,
        end,
        request.guest_count,
        &addons,
        request.additional_price,
    ))?)
}

fn build_addon(location_id: &str, request: NewAddon) -> Result<Addon, AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("add-on name must not be empty".into()));
    }
    if request.price < 0 {
        return Err(BookingError::NegativeAmount { field: "addon price" }.into());
    }
    Ok(Addon {
        id: request
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        location_id: location_id.to_string(),
        name: request.name.trim().to_string(),
        price: request.price,
        price_unit: request.price_unit,
    })
}
