pub mod gateway;
pub mod parser;
pub mod phone;
pub mod templates;

/// Inbound message as seen by the core, already stripped of provider framing.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub from: String,
    pub body: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
}
