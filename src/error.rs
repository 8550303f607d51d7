use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("no carriers available")]
    NoCarriersAvailable,

    #[error("message gateway is not configured")]
    GatewayUnavailable,

    #[error("message gateway rejected the send: {0}")]
    GatewayRejected(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::NoCarriersAvailable => (
                StatusCode::NOT_FOUND,
                "no carriers available for this offer".to_string(),
            ),
            AppError::GatewayUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "messaging service is not available".to_string(),
            ),
            AppError::GatewayRejected(msg) => {
                tracing::warn!(error = %msg, "gateway rejected outbound message");
                (
                    StatusCode::BAD_GATEWAY,
                    "messaging service rejected the request".to_string(),
                )
            }
            // Raw detail stays in the logs, never in the response body.
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "unexpected error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
