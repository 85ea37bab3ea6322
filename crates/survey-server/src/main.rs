//! Survey Server - Always-on backend for survey flight simulation

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Result};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use survey_server::api;
use survey_server::config::Config;
use survey_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();

    // Initialize tracing
    let filter = EnvFilter::from_default_env().add_directive("survey_server=debug".parse()?);
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Survey Server...");

    let errors = config.validate();
    if !errors.is_empty() {
        bail!("Invalid configuration: {}", errors.join("; "));
    }

    let port = config.server_port;
    let missions_file = config.missions_file.clone();
    let state = Arc::new(AppState::new(config));

    if let Some(path) = missions_file {
        let loaded = state.repository().load_file(&path)?;
        tracing::info!("Loaded {} mission(s) from {}", loaded, path);
    }

    // Build the app
    let app = api::routes()
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Run server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", err);
                return;
            }
            tracing::info!("Shutdown signal received");
            state.registry().shutdown().await;
        })
        .await?;

    Ok(())
}
