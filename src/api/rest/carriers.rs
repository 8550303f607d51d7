use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::carrier::Carrier;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/carriers", post(create_carrier).get(list_carriers))
        .route("/carriers/:id/availability", patch(update_availability))
}

#[derive(Deserialize)]
pub struct CreateCarrierRequest {
    pub business_name: String,
    pub driver_name: String,
    pub tax_id: String,
    pub whatsapp_number: String,
    pub truck_plate: String,
    pub capacity_tons: f64,
}

async fn create_carrier(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCarrierRequest>,
) -> Result<Json<Carrier>, AppError> {
    if payload.business_name.trim().is_empty() {
        return Err(AppError::Validation("business_name is required".to_string()));
    }
    if payload.whatsapp_number.trim().is_empty() {
        return Err(AppError::Validation("whatsapp_number is required".to_string()));
    }

    let duplicate = state
        .carriers
        .iter()
        .any(|entry| entry.value().tax_id == payload.tax_id);
    if duplicate {
        return Err(AppError::Conflict("tax_id is already registered".to_string()));
    }

    let now = Utc::now();
    let carrier = Carrier {
        id: Uuid::new_v4(),
        business_name: payload.business_name,
        driver_name: payload.driver_name,
        tax_id: payload.tax_id,
        whatsapp_number: payload.whatsapp_number,
        truck_plate: payload.truck_plate,
        capacity_tons: payload.capacity_tons,
        active: true,
        available: true,
        resume_available_at: None,
        created_at: now,
        updated_at: now,
    };

    state.carriers.insert(carrier.id, carrier.clone());
    Ok(Json(carrier))
}

async fn list_carriers(State(state): State<Arc<AppState>>) -> Json<Vec<Carrier>> {
    let carriers = state
        .carriers
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(carriers)
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub available: bool,
    /// When going unavailable, the reactivation sweep flips the carrier back
    /// once this moment passes.
    pub resume_at: Option<DateTime<Utc>>,
}

async fn update_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Carrier>, AppError> {
    let mut carrier = state
        .carriers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound("carrier not found".to_string()))?;

    carrier.available = payload.available;
    carrier.resume_available_at = if payload.available {
        None
    } else {
        payload.resume_at
    };
    carrier.updated_at = Utc::now();

    Ok(Json(carrier.clone()))
}
