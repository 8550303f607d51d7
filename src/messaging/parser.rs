//! Interprets a carrier's free-form reply against the session context. The
//! same literal "1" confirms an offer under `trip_offer` and reports "arrived
//! to load" under `check_in`; meaning lives in the session, not the text.

use crate::models::session::SessionContext;
use crate::models::trip::CheckpointStage;

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    CheckIn(CheckpointStage),
    TripConfirmation { trucks: u32 },
    TripRejection,
    Unknown(String),
}

impl Intent {
    /// Label used for the webhook intent metric.
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::CheckIn(_) => "check_in",
            Intent::TripConfirmation { .. } => "confirmation",
            Intent::TripRejection => "rejection",
            Intent::Unknown(_) => "unknown",
        }
    }
}

const CONFIRM_KEYWORD: &str = "confirmo";
const REJECT_KEYWORD: &str = "no tengo";

pub fn parse(raw: &str, context: Option<SessionContext>) -> Intent {
    let text = raw.trim().to_lowercase();

    if context == Some(SessionContext::CheckIn) {
        if let Some(stage) = digit_to_stage(&text) {
            return Intent::CheckIn(stage);
        }
        // Anything else while a check-in is expected is noise, not an offer
        // reply; fall through to the keyword net only for explicit words.
    }

    if context == Some(SessionContext::TripOffer) {
        if text == "1" || text.contains(CONFIRM_KEYWORD) {
            return Intent::TripConfirmation { trucks: 1 };
        }
        if text == "2" || text.contains(REJECT_KEYWORD) {
            return Intent::TripRejection;
        }
    }

    // Context-independent safety net for carriers replying in words.
    if text.contains(CONFIRM_KEYWORD) {
        return Intent::TripConfirmation { trucks: 1 };
    }
    if text.contains(REJECT_KEYWORD) {
        return Intent::TripRejection;
    }

    Intent::Unknown(text)
}

fn digit_to_stage(text: &str) -> Option<CheckpointStage> {
    match text {
        "1" => Some(CheckpointStage::ArrivedToLoad),
        "2" => Some(CheckpointStage::LoadedDeparting),
        "3" => Some(CheckpointStage::EnRoute),
        "4" => Some(CheckpointStage::ArrivedAtDestination),
        "5" => Some(CheckpointStage::Unloaded),
        _ => None,
    }
}
