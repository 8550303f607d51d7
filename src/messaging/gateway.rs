use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::messaging::phone;

#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub message_sid: String,
}

/// Outbound messaging seam. The dispatch orchestrator only ever talks to this
/// trait; tests plug in a recording implementation.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// `to` may be in any stored format; implementations canonicalize it.
    async fn send(&self, to: &str, body: &str) -> Result<SendReceipt, AppError>;
}

/// Twilio WhatsApp gateway. Credentials are read at construction; a missing
/// or placeholder pair degrades every send into `GatewayUnavailable` instead
/// of failing at startup, so the rest of the API keeps working without it.
pub struct TwilioGateway {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioGateway {
    pub fn from_config(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            from_number: config.twilio_whatsapp_number.clone(),
        }
    }

    fn is_configured(&self) -> bool {
        !self.account_sid.is_empty()
            && !self.auth_token.is_empty()
            && !self.account_sid.starts_with("TU_")
            && !self.auth_token.starts_with("TU_")
    }
}

#[derive(Debug, Deserialize)]
struct TwilioMessageResponse {
    sid: String,
}

#[async_trait]
impl MessageGateway for TwilioGateway {
    async fn send(&self, to: &str, body: &str) -> Result<SendReceipt, AppError> {
        if !self.is_configured() {
            warn!("twilio credentials missing; outbound message dropped");
            return Err(AppError::GatewayUnavailable);
        }

        let formatted_to = phone::outbound(to);
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("From", self.from_number.as_str()),
                ("To", formatted_to.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .map_err(|err| AppError::GatewayRejected(format!("request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::GatewayRejected(format!(
                "provider returned {status}: {detail}"
            )));
        }

        let message = response
            .json::<TwilioMessageResponse>()
            .await
            .map_err(|err| AppError::GatewayRejected(format!("unreadable response: {err}")))?;

        info!(to = %formatted_to, sid = %message.sid, "whatsapp message sent");
        Ok(SendReceipt {
            message_sid: message.sid,
        })
    }
}
