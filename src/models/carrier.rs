use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Carrier {
    pub id: Uuid,
    pub business_name: String,
    pub driver_name: String,
    pub tax_id: String,
    /// Stored as entered by the back office; inbound matching bridges the
    /// format gap via phone variants.
    pub whatsapp_number: String,
    pub truck_plate: String,
    pub capacity_tons: f64,
    pub active: bool,
    pub available: bool,
    /// When set, the reactivation sweep flips `available` back on once due.
    pub resume_available_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
