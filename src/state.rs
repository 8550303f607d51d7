use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::messaging::gateway::MessageGateway;
use crate::models::carrier::Carrier;
use crate::models::session::Session;
use crate::models::trip::Trip;
use crate::observability::metrics::Metrics;
use crate::realtime::EventHub;

pub struct AppState {
    pub trips: DashMap<Uuid, Trip>,
    pub carriers: DashMap<Uuid, Carrier>,
    pub sessions: DashMap<Uuid, Session>,
    trip_seq: AtomicU64,
    pub events: EventHub,
    pub gateway: Arc<dyn MessageGateway>,
    pub metrics: Metrics,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, gateway: Arc<dyn MessageGateway>) -> Self {
        let events = EventHub::new(config.event_buffer_size);

        Self {
            trips: DashMap::new(),
            carriers: DashMap::new(),
            sessions: DashMap::new(),
            trip_seq: AtomicU64::new(0),
            events,
            gateway,
            metrics: Metrics::new(),
            config,
        }
    }

    /// Mints the next trip number. Strictly increasing for the life of the
    /// process; a number is never handed out twice.
    pub fn next_trip_number(&self) -> String {
        let n = self.trip_seq.fetch_add(1, Ordering::SeqCst) + 1;
        format!("TR-{n:06}")
    }

    pub fn tracking_url(&self, token: &str) -> String {
        format!("{}/track/{token}", self.config.tracking_base_url)
    }
}
