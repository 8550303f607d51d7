use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::dispatch::orchestrator;
use crate::error::AppError;
use crate::messaging::InboundMessage;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/whatsapp/offers", post(send_offers))
        .route("/whatsapp/webhook", post(webhook))
        .route("/whatsapp/reminder", post(send_reminder))
        .route("/whatsapp/update", post(send_update))
}

#[derive(Deserialize)]
pub struct OfferRequest {
    pub trip_id: Uuid,
    pub carrier_ids: Option<Vec<Uuid>>,
}

async fn send_offers(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OfferRequest>,
) -> Result<Json<orchestrator::OfferReport>, AppError> {
    let report = orchestrator::send_offers(&state, payload.trip_id, payload.carrier_ids).await?;
    Ok(Json(report))
}

/// Provider webhook payload, form-encoded with the provider's field names.
#[derive(Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body")]
    pub body: Option<String>,
    #[serde(rename = "Latitude")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude")]
    pub longitude: Option<f64>,
    #[serde(rename = "MediaUrl0")]
    pub media_url: Option<String>,
    #[serde(rename = "MediaContentType0")]
    pub media_type: Option<String>,
}

/// Always acknowledges with a fixed body. An error response here would make
/// the provider redeliver the message and replay the state transition.
async fn webhook(
    State(state): State<Arc<AppState>>,
    Form(payload): Form<WebhookPayload>,
) -> impl IntoResponse {
    let inbound = InboundMessage {
        from: payload.from,
        body: payload.body.unwrap_or_default(),
        latitude: payload.latitude,
        longitude: payload.longitude,
        media_url: payload.media_url,
        media_type: payload.media_type,
    };

    orchestrator::process_inbound(&state, inbound).await;

    (StatusCode::OK, "OK")
}

#[derive(Deserialize)]
pub struct ReminderRequest {
    pub trip_id: Uuid,
}

async fn send_reminder(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ReminderRequest>,
) -> Result<impl IntoResponse, AppError> {
    orchestrator::send_check_in_reminder(&state, payload.trip_id).await?;
    Ok(Json(json!({ "message": "reminder sent" })))
}

#[derive(Deserialize)]
pub struct TripUpdateRequest {
    pub trip_id: Uuid,
    pub message: String,
}

async fn send_update(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TripUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.message.trim().is_empty() {
        return Err(AppError::Validation("message is required".to_string()));
    }
    orchestrator::send_trip_update(&state, payload.trip_id, &payload.message).await?;
    Ok(Json(json!({ "message": "update sent" })))
}
