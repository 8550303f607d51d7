use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub offers_total: IntCounterVec,
    pub webhook_messages_total: IntCounterVec,
    pub location_updates_total: IntCounterVec,
    pub open_sessions: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let offers_total = IntCounterVec::new(
            Opts::new("offers_total", "Trip offers sent by outcome"),
            &["outcome"],
        )
        .expect("valid offers_total metric");

        let webhook_messages_total = IntCounterVec::new(
            Opts::new("webhook_messages_total", "Inbound webhook messages by parsed intent"),
            &["intent"],
        )
        .expect("valid webhook_messages_total metric");

        let location_updates_total = IntCounterVec::new(
            Opts::new("location_updates_total", "Accepted location updates by source"),
            &["source"],
        )
        .expect("valid location_updates_total metric");

        let open_sessions = IntGauge::new("open_sessions", "Current number of non-terminal sessions")
            .expect("valid open_sessions metric");

        registry
            .register(Box::new(offers_total.clone()))
            .expect("register offers_total");
        registry
            .register(Box::new(webhook_messages_total.clone()))
            .expect("register webhook_messages_total");
        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");
        registry
            .register(Box::new(open_sessions.clone()))
            .expect("register open_sessions");

        Self {
            registry,
            offers_total,
            webhook_messages_total,
            location_updates_total,
            open_sessions,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
