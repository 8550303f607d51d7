use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Requested,
    Quoting,
    Confirmed,
    Assigning,
    InProgress,
    Finished,
}

/// Carrier-reported checkpoints, in the order they happen on the road.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStage {
    ArrivedToLoad,
    LoadedDeparting,
    EnRoute,
    ArrivedAtDestination,
    Unloaded,
}

impl CheckpointStage {
    pub const ALL: [CheckpointStage; 5] = [
        CheckpointStage::ArrivedToLoad,
        CheckpointStage::LoadedDeparting,
        CheckpointStage::EnRoute,
        CheckpointStage::ArrivedAtDestination,
        CheckpointStage::Unloaded,
    ];

    /// The only stage that closes a trip.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckpointStage::Unloaded)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckpointStage::ArrivedToLoad => "Llegué a cargar",
            CheckpointStage::LoadedDeparting => "Cargado, saliendo",
            CheckpointStage::EnRoute => "En camino",
            CheckpointStage::ArrivedAtDestination => "Llegué a destino",
            CheckpointStage::Unloaded => "Descargado",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub address: String,
    pub city: String,
    pub province: String,
    pub coords: Option<GeoPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: TripStatus,
    pub actor: Option<String>,
    pub at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: Uuid,
    pub stage: CheckpointStage,
    pub description: String,
    pub at: DateTime<Utc>,
    pub location: Option<GeoPoint>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentLocation {
    pub lat: f64,
    pub lng: f64,
    pub updated_at: DateTime<Utc>,
}

/// One GPS ping on the trail. `at` is stamped server-side on arrival so the
/// trail stays monotonic even when client clocks drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailPoint {
    pub lat: f64,
    pub lng: f64,
    pub at: DateTime<Utc>,
    pub speed: Option<f64>,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    /// Human-readable sequential number, assigned once at creation.
    pub number: String,
    pub producer_name: String,
    pub carrier_id: Option<Uuid>,
    pub origin: Stop,
    pub destination: Stop,
    pub cargo_type: String,
    pub weight_tons: f64,
    pub trucks_requested: u32,
    pub trucks_recommended: u32,
    pub scheduled_date: DateTime<Utc>,
    pub agreed_price: Option<f64>,
    pub notes: Option<String>,
    pub status: TripStatus,
    pub sub_status: Option<CheckpointStage>,
    pub status_history: Vec<StatusChange>,
    pub check_ins: Vec<CheckIn>,
    pub current_location: Option<CurrentLocation>,
    pub trail: Vec<TrailPoint>,
    pub tracking_token: Option<String>,
    pub tracking_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn push_status(&mut self, status: TripStatus, actor: Option<String>, notes: Option<String>) {
        self.status = status;
        self.status_history.push(StatusChange {
            status,
            actor,
            at: Utc::now(),
            notes,
        });
        self.updated_at = Utc::now();
    }
}
