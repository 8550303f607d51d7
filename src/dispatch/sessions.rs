//! Session lifecycle. The messaging channel has no session concept of its
//! own, so an inbound message is bound to "the most recently created
//! non-terminal session for that phone number". Opening a new session
//! expires any prior non-terminal ones for the number, so a stale offer can
//! never swallow a check-in reply.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::models::session::{Session, SessionContext, SessionMetadata, SessionStatus};
use crate::state::AppState;

/// Most recently created non-terminal session for the number. Sessions past
/// their hard TTL are marked expired on the way through.
pub fn find_active(state: &AppState, phone_number: &str) -> Option<Session> {
    let now = Utc::now();
    let mut overdue = Vec::new();
    let mut best: Option<Session> = None;

    for entry in state.sessions.iter() {
        let session = entry.value();
        if session.phone_number != phone_number || session.status.is_terminal() {
            continue;
        }
        if session.expires_at <= now {
            overdue.push(session.id);
            continue;
        }
        if best
            .as_ref()
            .is_none_or(|b| session.created_at > b.created_at)
        {
            best = Some(session.clone());
        }
    }

    for id in overdue {
        if let Some(mut session) = state.sessions.get_mut(&id) {
            session.status = SessionStatus::Expired;
        }
    }
    refresh_gauge(state);

    best
}

/// Opens a session for the number, superseding prior non-terminal ones.
pub fn open(
    state: &AppState,
    phone_number: &str,
    carrier_id: Uuid,
    trip_id: Option<Uuid>,
    status: SessionStatus,
    context: SessionContext,
) -> Session {
    let superseded: Vec<Uuid> = state
        .sessions
        .iter()
        .filter(|entry| {
            entry.value().phone_number == phone_number && !entry.value().status.is_terminal()
        })
        .map(|entry| entry.value().id)
        .collect();

    for id in superseded {
        if let Some(mut session) = state.sessions.get_mut(&id) {
            session.status = SessionStatus::Expired;
        }
    }

    let now = Utc::now();
    let session = Session {
        id: Uuid::new_v4(),
        phone_number: phone_number.to_string(),
        carrier_id,
        trip_id,
        status,
        context,
        last_message_at: now,
        expires_at: now + Duration::hours(state.config.session_ttl_hours),
        metadata: SessionMetadata::default(),
        created_at: now,
    };

    state.sessions.insert(session.id, session.clone());
    refresh_gauge(state);
    session
}

pub fn set_status(state: &AppState, id: Uuid, status: SessionStatus) {
    if let Some(mut session) = state.sessions.get_mut(&id) {
        session.status = status;
        session.last_message_at = Utc::now();
    }
    refresh_gauge(state);
}

pub fn set_pending_check_in(state: &AppState, id: Uuid, check_in_id: Option<Uuid>) {
    if let Some(mut session) = state.sessions.get_mut(&id) {
        session.metadata.last_check_in = check_in_id;
        session.last_message_at = Utc::now();
    }
}

fn refresh_gauge(state: &AppState) {
    let open = state
        .sessions
        .iter()
        .filter(|entry| !entry.value().status.is_terminal())
        .count();
    state.metrics.open_sessions.set(open as i64);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::{find_active, open};
    use crate::config::Config;
    use crate::error::AppError;
    use crate::messaging::gateway::{MessageGateway, SendReceipt};
    use crate::models::session::{SessionContext, SessionStatus};
    use crate::state::AppState;

    struct NullGateway;

    #[async_trait]
    impl MessageGateway for NullGateway {
        async fn send(&self, _to: &str, _body: &str) -> Result<SendReceipt, AppError> {
            Err(AppError::GatewayUnavailable)
        }
    }

    fn test_state() -> AppState {
        let config = Config {
            http_port: 0,
            log_level: "info".to_string(),
            event_buffer_size: 16,
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_whatsapp_number: String::new(),
            tracking_base_url: "http://localhost:5175".to_string(),
            session_ttl_hours: 24,
            reactivation_interval_secs: 60,
        };
        AppState::new(config, Arc::new(NullGateway))
    }

    #[test]
    fn open_supersedes_prior_non_terminal_sessions() {
        let state = test_state();
        let carrier = Uuid::new_v4();

        let first = open(
            &state,
            "1136174705",
            carrier,
            None,
            SessionStatus::WaitingResponse,
            SessionContext::TripOffer,
        );
        let second = open(
            &state,
            "1136174705",
            carrier,
            None,
            SessionStatus::Active,
            SessionContext::CheckIn,
        );

        let found = find_active(&state, "1136174705").unwrap();
        assert_eq!(found.id, second.id);
        assert_eq!(
            state.sessions.get(&first.id).unwrap().status,
            SessionStatus::Expired
        );
    }

    #[test]
    fn expired_ttl_sessions_are_not_returned() {
        let state = test_state();
        let session = open(
            &state,
            "1136174705",
            Uuid::new_v4(),
            None,
            SessionStatus::Active,
            SessionContext::CheckIn,
        );

        state.sessions.get_mut(&session.id).unwrap().expires_at = Utc::now() - Duration::hours(1);

        assert!(find_active(&state, "1136174705").is_none());
        assert_eq!(
            state.sessions.get(&session.id).unwrap().status,
            SessionStatus::Expired
        );
    }

    #[test]
    fn lookup_is_scoped_to_the_phone_number() {
        let state = test_state();
        open(
            &state,
            "1136174705",
            Uuid::new_v4(),
            None,
            SessionStatus::Active,
            SessionContext::CheckIn,
        );

        assert!(find_active(&state, "1199999999").is_none());
    }
}
