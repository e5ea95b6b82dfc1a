pub mod api;
pub mod bootstrap;
pub mod chat_log;
pub mod health;
pub mod logging;

use std::time::Duration;

use anyhow::Result;
use axum::Router;

use dealerbot_core::config::{AppConfig, LoadOptions};

pub use api::AppState;
pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
pub use chat_log::ChatLogSink;

/// Every HTTP route the service exposes.
pub fn app_router(state: api::AppState, health: health::HealthState) -> Router {
    api::router(state).merge(health::router(health))
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    logging::init_logging(&config.logging);

    let Application { config, db_pool, state, health, chat_log_worker } =
        bootstrap_with_config(config).await?;

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "dealerbot server listening"
    );

    axum::serve(listener, app_router(state, health))
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "dealerbot server stopping"
    );

    // The router and its state are gone, so the chat-log queue drains and the worker exits.
    let grace = Duration::from_secs(config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, chat_log_worker).await.is_err() {
        tracing::warn!(
            event_name = "system.server.chat_log_drain_timeout",
            correlation_id = "shutdown",
            "chat log writer did not drain before shutdown deadline"
        );
    }
    db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            error = %error,
            "could not listen for shutdown signal"
        );
    }
}
