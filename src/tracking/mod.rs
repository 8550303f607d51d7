//! Token-keyed public tracking surface. The token is a capability: whoever
//! holds it can read this trip's public view and push GPS pings, nothing
//! else, with no login involved.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::trip::{CheckpointStage, CurrentLocation, TrailPoint, Trip, TripStatus};
use crate::realtime;
use crate::state::AppState;

pub fn mint_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub tracking_token: String,
    pub tracking_url: String,
    pub trip: TokenTripRef,
}

#[derive(Debug, Serialize)]
pub struct TokenTripRef {
    pub id: Uuid,
    pub number: String,
}

/// Idempotent: repeated calls for the same trip return the same token.
pub fn generate_token(state: &AppState, trip_id: Uuid) -> Result<TokenResponse, AppError> {
    let mut trip = state
        .trips
        .get_mut(&trip_id)
        .ok_or_else(|| AppError::NotFound("trip not found".to_string()))?;

    let token = match &trip.tracking_token {
        Some(token) => token.clone(),
        None => {
            let token = mint_token();
            trip.tracking_token = Some(token.clone());
            trip.updated_at = Utc::now();
            token
        }
    };

    Ok(TokenResponse {
        tracking_url: state.tracking_url(&token),
        tracking_token: token,
        trip: TokenTripRef {
            id: trip.id,
            number: trip.number.clone(),
        },
    })
}

/// What an anonymous token holder may see. No pricing, no counterparty
/// details beyond display names.
#[derive(Debug, Serialize)]
pub struct PublicTripView {
    pub trip_id: Uuid,
    pub number: String,
    pub origin_city: String,
    pub origin_province: String,
    pub destination_city: String,
    pub destination_province: String,
    pub scheduled_date: DateTime<Utc>,
    pub status: TripStatus,
    pub sub_status: Option<CheckpointStage>,
    pub producer: String,
    pub carrier: Option<String>,
    pub tracking_active: bool,
    pub current_location: Option<CurrentLocation>,
}

pub fn trip_by_token(state: &AppState, token: &str) -> Result<PublicTripView, AppError> {
    let trip = find_by_token(state, token)?;
    let carrier = trip
        .carrier_id
        .and_then(|id| state.carriers.get(&id).map(|c| c.business_name.clone()));

    Ok(PublicTripView {
        trip_id: trip.id,
        number: trip.number,
        origin_city: trip.origin.city,
        origin_province: trip.origin.province,
        destination_city: trip.destination.city,
        destination_province: trip.destination.province,
        scheduled_date: trip.scheduled_date,
        status: trip.status,
        sub_status: trip.sub_status,
        producer: trip.producer_name,
        carrier,
        tracking_active: trip.tracking_active,
        current_location: trip.current_location,
    })
}

pub fn set_active(state: &AppState, token: &str, active: bool) -> Result<Uuid, AppError> {
    let trip_id = find_by_token(state, token)?.id;

    if let Some(mut trip) = state.trips.get_mut(&trip_id) {
        trip.tracking_active = active;
        trip.updated_at = Utc::now();
    }

    let event = if active {
        realtime::TRACKING_STARTED
    } else {
        realtime::TRACKING_STOPPED
    };
    state.events.emit(trip_id, event, json!({}));

    Ok(trip_id)
}

#[derive(Debug, Deserialize)]
pub struct LocationUpdate {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct LocationAck {
    pub location: CurrentLocation,
    pub total_points: usize,
}

/// Appends a trail point and refreshes the snapshot. Rejected outright while
/// tracking is inactive; the trail is never touched on a rejected update.
pub fn update_location(
    state: &AppState,
    token: &str,
    update: LocationUpdate,
) -> Result<LocationAck, AppError> {
    if !update.latitude.is_finite() || !update.longitude.is_finite() {
        return Err(AppError::Validation(
            "latitude and longitude must be numeric".to_string(),
        ));
    }
    if !(-90.0..=90.0).contains(&update.latitude) || !(-180.0..=180.0).contains(&update.longitude) {
        return Err(AppError::Validation(
            "latitude and longitude out of range".to_string(),
        ));
    }

    let trip_id = {
        let trip = find_by_token(state, token)?;
        if !trip.tracking_active {
            return Err(AppError::Validation(
                "tracking is not active for this trip".to_string(),
            ));
        }
        trip.id
    };

    let (location, total_points) = {
        let mut trip = state
            .trips
            .get_mut(&trip_id)
            .ok_or_else(|| AppError::NotFound("trip not found".to_string()))?;

        let now = Utc::now();
        let location = CurrentLocation {
            lat: update.latitude,
            lng: update.longitude,
            updated_at: now,
        };
        trip.current_location = Some(location.clone());
        // Stamped with server time: the trail stays ordered by arrival even
        // when clients report stale clocks.
        trip.trail.push(TrailPoint {
            lat: update.latitude,
            lng: update.longitude,
            at: now,
            speed: update.speed,
            accuracy: update.accuracy,
        });
        trip.updated_at = now;
        (location, trip.trail.len())
    };

    state
        .metrics
        .location_updates_total
        .with_label_values(&["tracking"])
        .inc();
    state.events.emit(
        trip_id,
        realtime::LOCATION_UPDATED,
        json!({
            "location": &location,
            "speed": update.speed,
            "accuracy": update.accuracy,
        }),
    );

    Ok(LocationAck {
        location,
        total_points,
    })
}

fn find_by_token(state: &AppState, token: &str) -> Result<Trip, AppError> {
    state
        .trips
        .iter()
        .find(|entry| entry.value().tracking_token.as_deref() == Some(token))
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound("trip not found or invalid token".to_string()))
}
