use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_whatsapp_number: String,
    pub tracking_base_url: String,
    pub session_ttl_hours: i64,
    pub reactivation_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_whatsapp_number: env::var("TWILIO_WHATSAPP_NUMBER")
                .unwrap_or_else(|_| "whatsapp:+14155238886".to_string()),
            tracking_base_url: env::var("TRACKING_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5175".to_string()),
            session_ttl_hours: parse_or_default("SESSION_TTL_HOURS", 24)?,
            reactivation_interval_secs: parse_or_default("REACTIVATION_INTERVAL_SECS", 60)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
