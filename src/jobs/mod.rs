//! Background maintenance. Carriers who marked themselves unavailable until
//! a given time get flipped back automatically; the sweep is a no-op when
//! nothing is due, so re-running it is always safe.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};
use tracing::info;

use crate::state::AppState;

pub async fn run_reactivation_sweep(state: Arc<AppState>) {
    let period = Duration::from_secs(state.config.reactivation_interval_secs);
    let mut ticker = interval(period);
    info!(period_secs = period.as_secs(), "carrier reactivation sweep started");

    loop {
        ticker.tick().await;
        let reactivated = reactivate_due_carriers(&state);
        if reactivated > 0 {
            info!(reactivated, "carriers reactivated");
        }
    }
}

pub fn reactivate_due_carriers(state: &AppState) -> usize {
    let now = Utc::now();
    let due: Vec<_> = state
        .carriers
        .iter()
        .filter(|entry| {
            let carrier = entry.value();
            !carrier.available
                && carrier
                    .resume_available_at
                    .is_some_and(|resume| resume <= now)
        })
        .map(|entry| entry.value().id)
        .collect();

    let mut reactivated = 0;
    for id in due {
        if let Some(mut carrier) = state.carriers.get_mut(&id) {
            carrier.available = true;
            carrier.resume_available_at = None;
            carrier.updated_at = now;
            reactivated += 1;
        }
    }
    reactivated
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::reactivate_due_carriers;
    use crate::config::Config;
    use crate::error::AppError;
    use crate::messaging::gateway::{MessageGateway, SendReceipt};
    use crate::models::carrier::Carrier;
    use crate::state::AppState;

    struct NullGateway;

    #[async_trait]
    impl MessageGateway for NullGateway {
        async fn send(&self, _to: &str, _body: &str) -> Result<SendReceipt, AppError> {
            Err(AppError::GatewayUnavailable)
        }
    }

    fn carrier(available: bool, resume_in_hours: Option<i64>) -> Carrier {
        Carrier {
            id: Uuid::new_v4(),
            business_name: "Transporte Sur".to_string(),
            driver_name: "Raúl".to_string(),
            tax_id: "20-11111111-1".to_string(),
            whatsapp_number: "1136174705".to_string(),
            truck_plate: "AB123CD".to_string(),
            capacity_tons: 30.0,
            active: true,
            available,
            resume_available_at: resume_in_hours.map(|h| Utc::now() + Duration::hours(h)),
            created_at: Utc::now(),
            updated_at: Utc::now(),
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
    fn due_carriers_are_reactivated_once() {
        let state = test_state();
        let due = carrier(false, Some(-1));
        let not_due = carrier(false, Some(2));
        let already_on = carrier(true, None);
        state.carriers.insert(due.id, due.clone());
        state.carriers.insert(not_due.id, not_due.clone());
        state.carriers.insert(already_on.id, already_on);

        assert_eq!(reactivate_due_carriers(&state), 1);
        assert!(state.carriers.get(&due.id).unwrap().available);
        assert!(!state.carriers.get(&not_due.id).unwrap().available);

        // Second run finds nothing to do.
        assert_eq!(reactivate_due_carriers(&state), 0);
    }
}
