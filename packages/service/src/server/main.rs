// Main entry point for the research orchestrator API

use anyhow::{Context, Result};
use service_core::{server::build_app, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,service_core=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting research orchestrator API");

    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!(port = config.port, model = %config.default_model, "configuration loaded");

    let app = build_app(config.clone());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(%addr, "binding listener");

    let listener = tokio::net::TcpListener::bind(&addr).await.context("failed to bind to address")?;

    axum::serve(listener, app.into_make_service()).await.context("server error")?;

    Ok(())
}
