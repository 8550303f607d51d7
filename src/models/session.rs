use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    WaitingResponse,
    WaitingLocation,
    Completed,
    Expired,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Expired)
    }
}

/// The conversational phase. A short reply like "1" means nothing on its own;
/// the context decides whether it confirms an offer or reports a checkpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionContext {
    TripOffer,
    CheckIn,
    General,
    ProblemReport,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Check-in a pending location share belongs to, so a delayed location
    /// message attaches to the right entry instead of "whatever is last".
    pub last_check_in: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    /// Carrier's number in its stored format, not the gateway's canonical one.
    pub phone_number: String,
    pub carrier_id: Uuid,
    pub trip_id: Option<Uuid>,
    pub status: SessionStatus,
    pub context: SessionContext,
    pub last_message_at: DateTime<Utc>,
    /// Hard TTL from creation; activity does not extend it.
    pub expires_at: DateTime<Utc>,
    pub metadata: SessionMetadata,
    pub created_at: DateTime<Utc>,
}
