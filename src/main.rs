mod api;
mod config;
mod dispatch;
mod error;
mod jobs;
mod messaging;
mod models;
mod observability;
mod realtime;
mod state;
mod tracking;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::messaging::gateway::TwilioGateway;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let gateway = Arc::new(TwilioGateway::from_config(&config));
    let shared_state = Arc::new(state::AppState::new(config.clone(), gateway));

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(jobs::run_reactivation_sweep(shared_state.clone()));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
