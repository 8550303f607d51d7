use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use freight_dispatch::api::rest::router;
use freight_dispatch::config::Config;
use freight_dispatch::error::AppError;
use freight_dispatch::messaging::gateway::{MessageGateway, SendReceipt};
use freight_dispatch::state::AppState;

/// Records every outbound message instead of talking to a provider.
#[derive(Default)]
struct RecordingGateway {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingGateway {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn bodies(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, body)| body).collect()
    }
}

#[async_trait]
impl MessageGateway for RecordingGateway {
    async fn send(&self, to: &str, body: &str) -> Result<SendReceipt, AppError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_string(), body.to_string()));
        Ok(SendReceipt {
            message_sid: format!("SM{:04}", sent.len()),
        })
    }
}

fn test_config() -> Config {
    Config {
        http_port: 0,
        log_level: "info".to_string(),
        event_buffer_size: 64,
        twilio_account_sid: String::new(),
        twilio_auth_token: String::new(),
        twilio_whatsapp_number: "whatsapp:+14155238886".to_string(),
        tracking_base_url: "http://localhost:5175".to_string(),
        session_ttl_hours: 24,
        reactivation_interval_secs: 60,
    }
}

fn setup() -> (axum::Router, Arc<AppState>, Arc<RecordingGateway>) {
    let gateway = Arc::new(RecordingGateway::default());
    let state = Arc::new(AppState::new(test_config(), gateway.clone()));
    (router(state.clone()), state, gateway)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn form_request(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let body = fields
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencode(value)))
        .collect::<Vec<_>>()
        .join("&");

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn urlencode(value: &str) -> String {
    value
        .replace('+', "%2B")
        .replace(':', "%3A")
        .replace(' ', "+")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn trip_payload() -> Value {
    json!({
        "producer_name": "Campo Verde SA",
        "origin": { "address": "Ruta 8 km 120", "city": "Pergamino", "province": "Buenos Aires", "coords": null },
        "destination": { "address": "Puerto", "city": "Rosario", "province": "Santa Fe", "coords": null },
        "weight_tons": 20.0,
        "trucks_requested": 1,
        "scheduled_date": "2026-09-01T12:00:00Z",
        "agreed_price": 450000.0
    })
}

fn carrier_payload(name: &str, phone: &str, tax_id: &str) -> Value {
    json!({
        "business_name": name,
        "driver_name": "Raúl",
        "tax_id": tax_id,
        "whatsapp_number": phone,
        "truck_plate": "AB123CD",
        "capacity_tons": 30.0
    })
}

async fn create_trip(app: &axum::Router) -> String {
    let res = app
        .clone()
        .oneshot(json_request("POST", "/trips", trip_payload()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await["id"].as_str().unwrap().to_string()
}

async fn create_carrier(app: &axum::Router, name: &str, phone: &str, tax_id: &str) -> String {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/carriers",
            carrier_payload(name, phone, tax_id),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await["id"].as_str().unwrap().to_string()
}

async fn send_offer(app: &axum::Router, trip_id: &str) -> Value {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/whatsapp/offers",
            json!({ "trip_id": trip_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await
}

async fn inbound(app: &axum::Router, from: &str, body: &str) {
    let res = app
        .clone()
        .oneshot(form_request(
            "/whatsapp/webhook",
            &[("From", from), ("Body", body)],
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

async fn get_trip(app: &axum::Router, trip_id: &str) -> Value {
    let res = app
        .clone()
        .oneshot(get_request(&format!("/trips/{trip_id}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state, _gateway) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["trips"], 0);
    assert_eq!(body["carriers"], 0);
    assert_eq!(body["sessions"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state, _gateway) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("open_sessions"));
}

#[tokio::test]
async fn trip_numbers_are_sequential_and_unique() {
    let (app, _state, _gateway) = setup();

    let res = app
        .clone()
        .oneshot(json_request("POST", "/trips", trip_payload()))
        .await
        .unwrap();
    let first = body_json(res).await;

    let res = app
        .clone()
        .oneshot(json_request("POST", "/trips", trip_payload()))
        .await
        .unwrap();
    let second = body_json(res).await;

    assert_eq!(first["number"], "TR-000001");
    assert_eq!(second["number"], "TR-000002");
    assert_eq!(first["status"], "requested");
    assert!(first["carrier_id"].is_null());
}

#[tokio::test]
async fn create_trip_rejects_non_positive_weight() {
    let (app, _state, _gateway) = setup();
    let mut payload = trip_payload();
    payload["weight_tons"] = json!(0.0);

    let res = app
        .oneshot(json_request("POST", "/trips", payload))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn offer_without_carriers_returns_404() {
    let (app, _state, _gateway) = setup();
    let trip_id = create_trip(&app).await;

    let res = app
        .oneshot(json_request(
            "POST",
            "/whatsapp/offers",
            json!({ "trip_id": trip_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn offer_flow_confirmation_assigns_carrier_and_mints_token() {
    let (app, _state, gateway) = setup();
    let carrier_id = create_carrier(&app, "Transporte Sur", "1136174705", "20-11111111-1").await;
    let trip_id = create_trip(&app).await;

    let report = send_offer(&app, &trip_id).await;
    assert_eq!(report["total"], 1);
    assert_eq!(report["successful"], 1);
    assert_eq!(report["results"][0]["success"], true);

    let trip = get_trip(&app, &trip_id).await;
    assert_eq!(trip["status"], "assigning");

    inbound(&app, "whatsapp:+5491136174705", "1").await;

    let trip = get_trip(&app, &trip_id).await;
    assert_eq!(trip["status"], "confirmed");
    assert_eq!(trip["carrier_id"], carrier_id.as_str());
    let token = trip["tracking_token"].as_str().unwrap();
    assert_eq!(token.len(), 64);

    // Confirmation reply carries the tracking link and check-in menu.
    let bodies = gateway.bodies();
    assert!(bodies.iter().any(|b| b.contains(token)));
    assert!(bodies.iter().any(|b| b.contains("Viaje confirmado")));
}

#[tokio::test]
async fn full_check_in_sequence_finishes_only_at_last_stage() {
    let (app, state, _gateway) = setup();
    create_carrier(&app, "Transporte Sur", "1136174705", "20-11111111-1").await;
    let trip_id = create_trip(&app).await;
    send_offer(&app, &trip_id).await;
    inbound(&app, "whatsapp:+5491136174705", "1").await;

    let expectations = [
        ("1", "in_progress", "arrived_to_load"),
        ("2", "in_progress", "loaded_departing"),
        ("3", "in_progress", "en_route"),
        ("4", "in_progress", "arrived_at_destination"),
        ("5", "finished", "unloaded"),
    ];

    for (digit, status, sub_status) in expectations {
        inbound(&app, "whatsapp:+5491136174705", digit).await;
        let trip = get_trip(&app, &trip_id).await;
        assert_eq!(trip["status"], status, "after digit {digit}");
        assert_eq!(trip["sub_status"], sub_status, "after digit {digit}");
    }

    let trip = get_trip(&app, &trip_id).await;
    assert_eq!(trip["check_ins"].as_array().unwrap().len(), 5);

    // Conversation is over: no session left open for the number.
    let open = state
        .sessions
        .iter()
        .filter(|entry| !entry.value().status.is_terminal())
        .count();
    assert_eq!(open, 0);
}

#[tokio::test]
async fn second_confirmer_gets_conflict_and_trip_keeps_first_carrier() {
    let (app, _state, gateway) = setup();
    let first = create_carrier(&app, "Transporte Sur", "1136174705", "20-11111111-1").await;
    create_carrier(&app, "Fletes Norte", "1144455566", "20-22222222-2").await;
    let trip_id = create_trip(&app).await;

    let report = send_offer(&app, &trip_id).await;
    assert_eq!(report["successful"], 2);

    inbound(&app, "whatsapp:+5491136174705", "1").await;
    inbound(&app, "whatsapp:+5491144455566", "1").await;

    let trip = get_trip(&app, &trip_id).await;
    assert_eq!(trip["carrier_id"], first.as_str());

    let conflict_reply = gateway
        .sent()
        .into_iter()
        .find(|(to, body)| to == "1144455566" && body.contains("ya fue asignado"));
    assert!(conflict_reply.is_some());
}

#[tokio::test]
async fn rejection_closes_session_and_leaves_trip_unassigned() {
    let (app, state, _gateway) = setup();
    create_carrier(&app, "Transporte Sur", "1136174705", "20-11111111-1").await;
    let trip_id = create_trip(&app).await;
    send_offer(&app, &trip_id).await;

    inbound(&app, "whatsapp:+5491136174705", "2").await;

    let trip = get_trip(&app, &trip_id).await;
    assert!(trip["carrier_id"].is_null());
    assert_eq!(trip["status"], "assigning");

    let open = state
        .sessions
        .iter()
        .filter(|entry| !entry.value().status.is_terminal())
        .count();
    assert_eq!(open, 0);
}

#[tokio::test]
async fn whatsapp_location_attaches_to_last_check_in() {
    let (app, _state, _gateway) = setup();
    create_carrier(&app, "Transporte Sur", "1136174705", "20-11111111-1").await;
    let trip_id = create_trip(&app).await;
    send_offer(&app, &trip_id).await;
    inbound(&app, "whatsapp:+5491136174705", "1").await;
    inbound(&app, "whatsapp:+5491136174705", "1").await;

    let res = app
        .clone()
        .oneshot(form_request(
            "/whatsapp/webhook",
            &[
                ("From", "whatsapp:+5491136174705"),
                ("Body", ""),
                ("Latitude", "-33.8965"),
                ("Longitude", "-60.5743"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let trip = get_trip(&app, &trip_id).await;
    let check_in = &trip["check_ins"][0];
    assert_eq!(check_in["location"]["lat"], -33.8965);
    assert_eq!(check_in["location"]["lng"], -60.5743);
    assert_eq!(trip["current_location"]["lat"], -33.8965);
}

#[tokio::test]
async fn webhook_from_unknown_number_acks_without_reply() {
    let (app, _state, gateway) = setup();

    let res = app
        .oneshot(form_request(
            "/whatsapp/webhook",
            &[("From", "whatsapp:+5491199999999"), ("Body", "hola")],
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_string(res).await, "OK");
    assert!(gateway.sent().is_empty());
}

#[tokio::test]
async fn tracking_token_generation_is_idempotent() {
    let (app, _state, _gateway) = setup();
    let trip_id = create_trip(&app).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/trips/{trip_id}/tracking-token"),
            json!({}),
        ))
        .await
        .unwrap();
    let first = body_json(res).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/trips/{trip_id}/tracking-token"),
            json!({}),
        ))
        .await
        .unwrap();
    let second = body_json(res).await;

    assert_eq!(first["tracking_token"], second["tracking_token"]);
    assert!(first["tracking_url"]
        .as_str()
        .unwrap()
        .contains(first["tracking_token"].as_str().unwrap()));
}

#[tokio::test]
async fn location_update_rejected_while_tracking_inactive() {
    let (app, _state, _gateway) = setup();
    let trip_id = create_trip(&app).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/trips/{trip_id}/tracking-token"),
            json!({}),
        ))
        .await
        .unwrap();
    let token = body_json(res).await["tracking_token"]
        .as_str()
        .unwrap()
        .to_string();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/tracking/{token}/location"),
            json!({ "latitude": -33.9, "longitude": -60.5 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Rejected update must not touch the trail.
    let res = app
        .oneshot(get_request(&format!("/trips/{trip_id}/trail")))
        .await
        .unwrap();
    let trail = body_json(res).await;
    assert_eq!(trail["total_points"], 0);
}

#[tokio::test]
async fn tracking_start_accepts_location_updates_until_stopped() {
    let (app, _state, _gateway) = setup();
    let trip_id = create_trip(&app).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/trips/{trip_id}/tracking-token"),
            json!({}),
        ))
        .await
        .unwrap();
    let token = body_json(res).await["tracking_token"]
        .as_str()
        .unwrap()
        .to_string();

    let res = app
        .clone()
        .oneshot(json_request("POST", &format!("/tracking/{token}/start"), json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/tracking/{token}/location"),
            json!({ "latitude": -33.9, "longitude": -60.5, "speed": 82.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ack = body_json(res).await;
    assert_eq!(ack["total_points"], 1);

    let res = app
        .clone()
        .oneshot(json_request("POST", &format!("/tracking/{token}/stop"), json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/tracking/{token}/location"),
            json!({ "latitude": -33.91, "longitude": -60.51 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn public_view_hides_pricing() {
    let (app, _state, _gateway) = setup();
    let trip_id = create_trip(&app).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/trips/{trip_id}/tracking-token"),
            json!({}),
        ))
        .await
        .unwrap();
    let token = body_json(res).await["tracking_token"]
        .as_str()
        .unwrap()
        .to_string();

    let res = app
        .oneshot(get_request(&format!("/tracking/{token}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let view = body_json(res).await;
    assert_eq!(view["number"], "TR-000001");
    assert_eq!(view["producer"], "Campo Verde SA");
    assert!(view.get("agreed_price").is_none());
    assert!(view.get("trail").is_none());
}

#[tokio::test]
async fn unknown_tracking_token_returns_404() {
    let (app, _state, _gateway) = setup();
    let res = app
        .oneshot(get_request("/tracking/deadbeef"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_status_appends_history_entry() {
    let (app, _state, _gateway) = setup();
    let trip_id = create_trip(&app).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/trips/{trip_id}/status"),
            json!({ "status": "quoting", "actor": "back-office", "notes": "rates requested" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let trip = body_json(res).await;
    assert_eq!(trip["status"], "quoting");
    let history = trip["status_history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["status"], "quoting");
    assert_eq!(history[0]["actor"], "back-office");
}

#[tokio::test]
async fn realtime_subscribers_see_status_and_location_events() {
    let (app, state, _gateway) = setup();
    let trip_id = create_trip(&app).await;
    let mut rx = state.events.subscribe();

    app.clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/trips/{trip_id}/status"),
            json!({ "status": "quoting" }),
        ))
        .await
        .unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.trip_id.to_string(), trip_id);
    assert_eq!(event.event, "status-updated");
    assert_eq!(event.payload["status"], "quoting");
}
