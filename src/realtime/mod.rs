use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

pub const STATUS_UPDATED: &str = "status-updated";
pub const CARRIER_ASSIGNED: &str = "carrier-assigned";
pub const CHECK_IN: &str = "check-in";
pub const LOCATION_UPDATED: &str = "location-updated";
pub const TRACKING_STARTED: &str = "tracking-started";
pub const TRACKING_STOPPED: &str = "tracking-stopped";

/// A dashboard-visible trip event. Subscribers filter on `trip_id`, which is
/// what makes one broadcast channel behave like per-trip rooms.
#[derive(Debug, Clone, Serialize)]
pub struct TripEvent {
    pub trip_id: Uuid,
    pub event: &'static str,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

/// Fan-out for live trip updates. Passed in through `AppState` rather than
/// living as a process global, so tests can subscribe to it directly.
pub struct EventHub {
    tx: broadcast::Sender<TripEvent>,
}

impl EventHub {
    pub fn new(buffer: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(buffer);
        Self { tx }
    }

    pub fn emit(&self, trip_id: Uuid, event: &'static str, payload: Value) {
        // No subscribers is not an error; dashboards come and go.
        let _ = self.tx.send(TripEvent {
            trip_id,
            event,
            payload,
            timestamp: Utc::now(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TripEvent> {
        self.tx.subscribe()
    }
}
