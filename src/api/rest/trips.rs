use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::trip::{
    CurrentLocation, Stop, TrailPoint, Trip, TripStatus,
};
use crate::realtime;
use crate::state::AppState;
use crate::tracking;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trips", post(create_trip).get(list_trips))
        .route("/trips/:id", get(get_trip))
        .route("/trips/:id/status", patch(update_status))
        .route("/trips/:id/trail", get(get_trail))
        .route("/trips/:id/tracking-token", post(generate_tracking_token))
}

fn default_cargo_type() -> String {
    "grain".to_string()
}

#[derive(Deserialize)]
pub struct CreateTripRequest {
    pub producer_name: String,
    pub origin: Stop,
    pub destination: Stop,
    #[serde(default = "default_cargo_type")]
    pub cargo_type: String,
    pub weight_tons: f64,
    pub trucks_requested: u32,
    pub trucks_recommended: Option<u32>,
    pub scheduled_date: DateTime<Utc>,
    pub agreed_price: Option<f64>,
    pub notes: Option<String>,
}

async fn create_trip(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTripRequest>,
) -> Result<Json<Trip>, AppError> {
    if payload.producer_name.trim().is_empty() {
        return Err(AppError::Validation("producer_name is required".to_string()));
    }
    if payload.weight_tons <= 0.0 || !payload.weight_tons.is_finite() {
        return Err(AppError::Validation("weight_tons must be > 0".to_string()));
    }
    if payload.trucks_requested == 0 {
        return Err(AppError::Validation("trucks_requested must be > 0".to_string()));
    }

    let now = Utc::now();
    let trip = Trip {
        id: Uuid::new_v4(),
        number: state.next_trip_number(),
        producer_name: payload.producer_name,
        carrier_id: None,
        origin: payload.origin,
        destination: payload.destination,
        cargo_type: payload.cargo_type,
        weight_tons: payload.weight_tons,
        trucks_requested: payload.trucks_requested,
        trucks_recommended: payload.trucks_recommended.unwrap_or(payload.trucks_requested),
        scheduled_date: payload.scheduled_date,
        agreed_price: payload.agreed_price,
        notes: payload.notes,
        status: TripStatus::Requested,
        sub_status: None,
        status_history: Vec::new(),
        check_ins: Vec::new(),
        current_location: None,
        trail: Vec::new(),
        tracking_token: None,
        tracking_active: false,
        created_at: now,
        updated_at: now,
    };

    state.trips.insert(trip.id, trip.clone());
    Ok(Json(trip))
}

#[derive(Deserialize)]
pub struct TripFilter {
    pub status: Option<TripStatus>,
}

async fn list_trips(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TripFilter>,
) -> Json<Vec<Trip>> {
    let mut trips: Vec<Trip> = state
        .trips
        .iter()
        .filter(|entry| {
            filter
                .status
                .is_none_or(|status| entry.value().status == status)
        })
        .map(|entry| entry.value().clone())
        .collect();

    trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(trips)
}

async fn get_trip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    let trip = state
        .trips
        .get(&id)
        .ok_or_else(|| AppError::NotFound("trip not found".to_string()))?;

    Ok(Json(trip.value().clone()))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TripStatus,
    pub actor: Option<String>,
    pub notes: Option<String>,
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Trip>, AppError> {
    let updated = {
        let mut trip = state
            .trips
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("trip not found".to_string()))?;
        trip.push_status(payload.status, payload.actor, payload.notes);
        trip.value().clone()
    };

    state.events.emit(
        id,
        realtime::STATUS_UPDATED,
        json!({ "status": updated.status }),
    );

    Ok(Json(updated))
}

#[derive(Serialize)]
struct TrailResponse {
    trail: Vec<TrailPoint>,
    current_location: Option<CurrentLocation>,
    tracking_active: bool,
    total_points: usize,
}

async fn get_trail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TrailResponse>, AppError> {
    let trip = state
        .trips
        .get(&id)
        .ok_or_else(|| AppError::NotFound("trip not found".to_string()))?;

    Ok(Json(TrailResponse {
        total_points: trip.trail.len(),
        trail: trip.trail.clone(),
        current_location: trip.current_location.clone(),
        tracking_active: trip.tracking_active,
    }))
}

async fn generate_tracking_token(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<tracking::TokenResponse>, AppError> {
    Ok(Json(tracking::generate_token(&state, id)?))
}
