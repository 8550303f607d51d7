//! The offer → confirm/reject → check-in state machine. Everything an inbound
//! WhatsApp message can do to a trip goes through here; every trip mutation
//! is followed by a fan-out emit so dashboards watching the trip stay live.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dispatch::sessions;
use crate::error::AppError;
use crate::messaging::{parser, phone, templates, InboundMessage};
use crate::messaging::parser::Intent;
use crate::models::carrier::Carrier;
use crate::models::session::{Session, SessionContext, SessionStatus};
use crate::models::trip::{CheckIn, CheckpointStage, CurrentLocation, Trip, TripStatus};
use crate::realtime;
use crate::state::AppState;
use crate::tracking;

#[derive(Debug, Serialize)]
pub struct OfferResult {
    pub carrier: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OfferReport {
    pub results: Vec<OfferResult>,
    pub total: usize,
    pub successful: usize,
}

/// Sends a trip offer to each eligible carrier and opens an offer session per
/// recipient. One failed send never aborts the rest of the batch.
pub async fn send_offers(
    state: &Arc<AppState>,
    trip_id: Uuid,
    carrier_ids: Option<Vec<Uuid>>,
) -> Result<OfferReport, AppError> {
    let trip = state
        .trips
        .get(&trip_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound("trip not found".to_string()))?;

    let candidates: Vec<Carrier> = match carrier_ids {
        Some(ids) if !ids.is_empty() => ids
            .iter()
            .filter_map(|id| state.carriers.get(id).map(|entry| entry.value().clone()))
            .filter(|carrier| carrier.active)
            .collect(),
        _ => state
            .carriers
            .iter()
            .filter(|entry| entry.value().active && entry.value().available)
            .map(|entry| entry.value().clone())
            .collect(),
    };

    if candidates.is_empty() {
        return Err(AppError::NoCarriersAvailable);
    }

    let mut results = Vec::with_capacity(candidates.len());
    let mut gateway_down = false;

    for carrier in &candidates {
        let body = templates::trip_offer(carrier, &trip);
        match state.gateway.send(&carrier.whatsapp_number, &body).await {
            Ok(receipt) => {
                sessions::open(
                    state,
                    &carrier.whatsapp_number,
                    carrier.id,
                    Some(trip.id),
                    SessionStatus::WaitingResponse,
                    SessionContext::TripOffer,
                );
                state.metrics.offers_total.with_label_values(&["sent"]).inc();
                info!(
                    trip = %trip.number,
                    carrier = %carrier.business_name,
                    sid = %receipt.message_sid,
                    "trip offer sent"
                );
                results.push(OfferResult {
                    carrier: carrier.business_name.clone(),
                    success: true,
                    error: None,
                });
            }
            Err(err) => {
                if matches!(err, AppError::GatewayUnavailable) {
                    gateway_down = true;
                }
                state
                    .metrics
                    .offers_total
                    .with_label_values(&["failed"])
                    .inc();
                warn!(
                    trip = %trip.number,
                    carrier = %carrier.business_name,
                    error = %err,
                    "trip offer failed"
                );
                results.push(OfferResult {
                    carrier: carrier.business_name.clone(),
                    success: false,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    let successful = results.iter().filter(|r| r.success).count();
    if successful == 0 && gateway_down {
        return Err(AppError::GatewayUnavailable);
    }

    if let Some(mut trip) = state.trips.get_mut(&trip_id) {
        trip.push_status(TripStatus::Assigning, None, None);
    }
    state.events.emit(
        trip_id,
        realtime::STATUS_UPDATED,
        json!({ "status": TripStatus::Assigning }),
    );

    Ok(OfferReport {
        total: results.len(),
        successful,
        results,
    })
}

/// Entry point for the provider webhook. Never fails outward: the provider
/// retries on errors, and a retried message would replay a state transition.
pub async fn process_inbound(state: &Arc<AppState>, inbound: InboundMessage) {
    let incoming_number = inbound.from.trim_start_matches("whatsapp:");

    let Some(carrier) = find_carrier_by_phone(state, incoming_number) else {
        // Replying here would confirm the number exists; log and drop.
        warn!(from = %incoming_number, "inbound message from unknown number dropped");
        return;
    };

    let session = sessions::find_active(state, &carrier.whatsapp_number);
    let intent = parser::parse(&inbound.body, session.as_ref().map(|s| s.context));
    state
        .metrics
        .webhook_messages_total
        .with_label_values(&[intent.kind()])
        .inc();

    if let (Some(lat), Some(lng)) = (inbound.latitude, inbound.longitude) {
        on_location(state, session, &carrier, lat, lng).await;
        return;
    }

    match intent {
        Intent::TripConfirmation { .. } => on_confirmation(state, session, &carrier).await,
        Intent::TripRejection => on_rejection(state, session, &carrier).await,
        Intent::CheckIn(stage) => on_check_in(state, session, &carrier, stage).await,
        Intent::Unknown(text) => {
            info!(carrier = %carrier.business_name, body = %text, "unrecognized message ignored");
        }
    }
}

async fn on_confirmation(state: &Arc<AppState>, session: Option<Session>, carrier: &Carrier) {
    let Some(session) = session else {
        reply(state, carrier, &templates::no_active_offer()).await;
        return;
    };
    let Some(trip_id) = session.trip_id else {
        reply(state, carrier, &templates::no_active_offer()).await;
        return;
    };

    let Some(trip) = state.trips.get(&trip_id).map(|entry| entry.value().clone()) else {
        reply(state, carrier, &templates::trip_unavailable()).await;
        sessions::set_status(state, session.id, SessionStatus::Completed);
        return;
    };

    // A second confirmer loses: the trip keeps its assigned carrier and this
    // carrier's session is closed with a conflict reply.
    if trip.carrier_id.is_some_and(|assigned| assigned != carrier.id) {
        reply(state, carrier, &templates::trip_already_assigned(&trip)).await;
        sessions::set_status(state, session.id, SessionStatus::Completed);
        return;
    }

    let confirmed = {
        let mut entry = match state.trips.get_mut(&trip_id) {
            Some(entry) => entry,
            None => return,
        };
        entry.carrier_id = Some(carrier.id);
        entry.push_status(
            TripStatus::Confirmed,
            Some(carrier.business_name.clone()),
            None,
        );
        if entry.tracking_token.is_none() {
            entry.tracking_token = Some(tracking::mint_token());
        }
        entry.value().clone()
    };

    state.events.emit(
        trip_id,
        realtime::CARRIER_ASSIGNED,
        json!({ "carrier_id": carrier.id, "carrier": &carrier.business_name }),
    );
    state.events.emit(
        trip_id,
        realtime::STATUS_UPDATED,
        json!({ "status": confirmed.status }),
    );

    let token = confirmed.tracking_token.as_deref().unwrap_or_default();
    let tracking_url = state.tracking_url(token);
    reply(
        state,
        carrier,
        &templates::trip_details_with_tracking(carrier, &confirmed, &tracking_url),
    )
    .await;

    sessions::set_status(state, session.id, SessionStatus::Completed);
    sessions::open(
        state,
        &carrier.whatsapp_number,
        carrier.id,
        Some(trip_id),
        SessionStatus::Active,
        SessionContext::CheckIn,
    );

    info!(trip = %confirmed.number, carrier = %carrier.business_name, "trip confirmed");
}

async fn on_rejection(state: &Arc<AppState>, session: Option<Session>, carrier: &Carrier) {
    let Some(session) = session.filter(|s| s.trip_id.is_some()) else {
        return;
    };

    reply(state, carrier, &templates::rejection_ack()).await;
    sessions::set_status(state, session.id, SessionStatus::Completed);
    info!(carrier = %carrier.business_name, "trip offer rejected");
}

async fn on_check_in(
    state: &Arc<AppState>,
    session: Option<Session>,
    carrier: &Carrier,
    stage: CheckpointStage,
) {
    let Some(session) = session else {
        reply(state, carrier, &templates::no_active_trip()).await;
        return;
    };
    let Some(trip_id) = session.trip_id else {
        reply(state, carrier, &templates::no_active_trip()).await;
        return;
    };

    let check_in = CheckIn {
        id: Uuid::new_v4(),
        stage,
        description: stage.label().to_string(),
        at: Utc::now(),
        location: None,
        notes: None,
    };

    let Some(updated) = apply_check_in(state, trip_id, &check_in, carrier) else {
        return;
    };

    state.events.emit(
        trip_id,
        realtime::CHECK_IN,
        json!({ "check_in": &check_in, "sub_status": updated.sub_status }),
    );
    state.events.emit(
        trip_id,
        realtime::STATUS_UPDATED,
        json!({ "status": updated.status }),
    );

    sessions::set_pending_check_in(state, session.id, Some(check_in.id));
    reply(state, carrier, &templates::check_in_recorded(&updated, stage)).await;

    if updated.status == TripStatus::Finished {
        reply(state, carrier, &templates::trip_finished()).await;
        sessions::set_status(state, session.id, SessionStatus::Completed);
        info!(trip = %updated.number, "trip finished");
    } else {
        // Re-sending the menu keeps the conversation anchored on the next stage.
        reply(state, carrier, &templates::check_in_menu(carrier, &updated)).await;
        sessions::set_status(state, session.id, SessionStatus::Active);
    }
}

fn apply_check_in(
    state: &Arc<AppState>,
    trip_id: Uuid,
    check_in: &CheckIn,
    carrier: &Carrier,
) -> Option<Trip> {
    let mut entry = state.trips.get_mut(&trip_id)?;

    entry.check_ins.push(check_in.clone());
    entry.sub_status = Some(check_in.stage);

    // Only the terminal checkpoint closes the trip.
    let next = if check_in.stage.is_terminal() {
        TripStatus::Finished
    } else {
        TripStatus::InProgress
    };
    if entry.status != next {
        entry.push_status(next, Some(carrier.driver_name.clone()), None);
    } else {
        entry.updated_at = Utc::now();
    }

    Some(entry.value().clone())
}

async fn on_location(
    state: &Arc<AppState>,
    session: Option<Session>,
    carrier: &Carrier,
    lat: f64,
    lng: f64,
) {
    let Some(session) = session else { return };
    let Some(trip_id) = session.trip_id else { return };

    let updated = {
        let Some(mut entry) = state.trips.get_mut(&trip_id) else {
            return;
        };

        // Correlate by the check-in id recorded when the stage was reported,
        // so a delayed location message lands on the right entry.
        let target = session.metadata.last_check_in;
        let slot = match target {
            Some(id) => entry.check_ins.iter_mut().find(|c| c.id == id),
            None => entry.check_ins.last_mut(),
        };
        if let Some(check_in) = slot {
            check_in.location = Some(crate::models::trip::GeoPoint { lat, lng });
        }

        entry.current_location = Some(CurrentLocation {
            lat,
            lng,
            updated_at: Utc::now(),
        });
        entry.updated_at = Utc::now();
        entry.value().clone()
    };

    state
        .metrics
        .location_updates_total
        .with_label_values(&["whatsapp"])
        .inc();
    state.events.emit(
        trip_id,
        realtime::LOCATION_UPDATED,
        json!({ "location": &updated.current_location }),
    );

    reply(state, carrier, &templates::location_received(&updated)).await;
    sessions::set_pending_check_in(state, session.id, None);
    sessions::set_status(state, session.id, SessionStatus::Active);
}

/// Resends the check-in menu to the assigned carrier.
pub async fn send_check_in_reminder(state: &Arc<AppState>, trip_id: Uuid) -> Result<(), AppError> {
    let (trip, carrier) = assigned_pair(state, trip_id)?;
    state
        .gateway
        .send(
            &carrier.whatsapp_number,
            &templates::check_in_menu(&carrier, &trip),
        )
        .await?;
    Ok(())
}

/// Free-form operator message to the assigned carrier.
pub async fn send_trip_update(
    state: &Arc<AppState>,
    trip_id: Uuid,
    message: &str,
) -> Result<(), AppError> {
    let (trip, carrier) = assigned_pair(state, trip_id)?;
    state
        .gateway
        .send(
            &carrier.whatsapp_number,
            &templates::trip_update(&trip, &carrier, message),
        )
        .await?;
    Ok(())
}

fn assigned_pair(state: &AppState, trip_id: Uuid) -> Result<(Trip, Carrier), AppError> {
    let trip = state
        .trips
        .get(&trip_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound("trip not found".to_string()))?;
    let carrier_id = trip
        .carrier_id
        .ok_or_else(|| AppError::NotFound("trip has no assigned carrier".to_string()))?;
    let carrier = state
        .carriers
        .get(&carrier_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound("carrier not found".to_string()))?;
    Ok((trip, carrier))
}

fn find_carrier_by_phone(state: &AppState, incoming: &str) -> Option<Carrier> {
    for variant in phone::match_variants(incoming) {
        let hit = state
            .carriers
            .iter()
            .find(|entry| entry.value().whatsapp_number == variant)
            .map(|entry| entry.value().clone());
        if let Some(carrier) = hit {
            return Some(carrier);
        }
    }
    None
}

/// Outbound replies inside webhook processing are best-effort: a gateway
/// failure is logged, never bubbled back to the provider.
async fn reply(state: &AppState, carrier: &Carrier, body: &str) {
    if let Err(err) = state.gateway.send(&carrier.whatsapp_number, body).await {
        warn!(carrier = %carrier.business_name, error = %err, "reply send failed");
    }
}
