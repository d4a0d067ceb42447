use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Addon, Location};
use crate::services::locations::{self, NewAddon, NewLocation, QuoteRequest};
use crate::services::pricing::PriceBreakdown;
use crate::state::AppState;

use super::auth::authenticate;

// POST /api/locations
pub async fn create_location(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewLocation>,
) -> Result<(StatusCode, Json<Location>), AppError> {
    let actor = authenticate(&headers, &state)?;

    let location = {
        let db = state.db()?;
        locations::create_location(&db, &actor, body)?
    };

    Ok((StatusCode::CREATED, Json(location)))
}

// GET /api/locations
#[derive(Deserialize)]
pub struct LocationsQuery {
    pub limit: Option<i64>,
}

pub async fn list_locations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<LocationsQuery>,
) -> Result<Json<Vec<Location>>, AppError> {
    let actor = authenticate(&headers, &state)?;

    let found = {
        let db = state.db()?;
        locations::list_locations(&db, &actor, query.limit.unwrap_or(50))?
    };

    Ok(Json(found))
}

// GET /api/locations/:id
pub async fn get_location(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Location>, AppError> {
    authenticate(&headers, &state)?;

    let location = {
        let db = state.db()?;
        locations::get_location(&db, &id)?
    };

    Ok(Json(location))
}

// POST /api/locations/:id/addons
pub async fn add_addon(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<NewAddon>,
) -> Result<(StatusCode, Json<Addon>), AppError> {
    let actor = authenticate(&headers, &state)?;

    let addon = {
        let db = state.db()?;
        locations::add_addon(&db, &actor, &id, body)?
    };

    Ok((StatusCode::CREATED, Json(addon)))
}

// POST /api/locations/:id/quote
pub async fn quote(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<QuoteRequest>,
) -> Result<Json<PriceBreakdown>, AppError> {
    authenticate(&headers, &state)?;

    let price = {
        let db = state.db()?;
        locations::quote(&db, &id, &body)?
    };

    Ok(Json(price))
}
