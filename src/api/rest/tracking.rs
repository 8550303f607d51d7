use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;
use crate::tracking;

/// Public, token-keyed surface. No login: holding the token is the grant.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tracking/:token", get(get_by_token))
        .route("/tracking/:token/start", post(start))
        .route("/tracking/:token/stop", post(stop))
        .route("/tracking/:token/location", post(update_location))
}

async fn get_by_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<tracking::PublicTripView>, AppError> {
    Ok(Json(tracking::trip_by_token(&state, &token)?))
}

async fn start(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracking::set_active(&state, &token, true)?;
    Ok(Json(json!({ "message": "tracking started", "tracking_active": true })))
}

async fn stop(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracking::set_active(&state, &token, false)?;
    Ok(Json(json!({ "message": "tracking stopped", "tracking_active": false })))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(payload): Json<tracking::LocationUpdate>,
) -> Result<Json<tracking::LocationAck>, AppError> {
    Ok(Json(tracking::update_location(&state, &token, payload)?))
}
