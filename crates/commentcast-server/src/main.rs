//! # commentcast
//!
//! Realtime comment broadcast server.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! commentcast
//!
//! # Run with a config file (commentcast.toml in the working directory,
//! # /etc/commentcast/ or ~/.config/commentcast/)
//! commentcast
//!
//! # Run with environment variables
//! COMMENTCAST_PORT=8080 COMMENTCAST_HOST=0.0.0.0 commentcast
//! ```

mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use commentcast_core::{Hub, HubHandle};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "commentcast=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::load()?;

    info!("Starting commentcast on {}:{}", config.host, config.port);

    metrics::init_metrics();

    let (hub, hub_task) = Hub::spawn(config.hub_config());

    handlers::run_server(config, hub.clone(), shutdown_signal(hub)).await?;

    if let Err(e) = hub_task.await {
        error!("Hub task failed: {}", e);
    }

    Ok(())
}

/// Resolve on Ctrl-C, after telling the hub to close every connection.
async fn shutdown_signal(hub: HubHandle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    hub.shutdown();
}
