mod bootstrap;
mod discord;
mod health;
mod lookup;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use ticketbooth_core::config::{AppConfig, LoadOptions};
use ticketbooth_core::TicketSessionRegistry;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

fn init_logging(config: &AppConfig) {
    use ticketbooth_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    let transport_mode = if app.gateway.is_noop_transport() { "noop" } else { "gateway" };

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState::new(Arc::clone(&app.registry), transport_mode),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.discord_transport_mode",
        transport_mode,
        correlation_id = "bootstrap",
        "discord gateway transport mode initialized"
    );

    let bootstrap::Application { config, registry, replies, gateway } = app;
    let gateway = tokio::spawn(async move { gateway.start().await });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        application_id = %config.discord.application_id,
        "ticketbooth-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        active_interviews = registry.active_count(),
        pending_replies = replies.pending(),
        "ticketbooth-server stopping"
    );

    drain(&registry, Duration::from_secs(config.server.graceful_shutdown_secs)).await;
    gateway.abort();
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

/// Gives in-flight interviews up to `grace` to finish. Sessions are in memory
/// only, so anything still pending afterwards is lost.
async fn drain(registry: &TicketSessionRegistry, grace: Duration) {
    let drained = tokio::time::timeout(grace, async {
        while registry.active_count() > 0 {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            abandoned_interviews = registry.active_count(),
            "shutdown grace period elapsed with interviews still pending"
        );
    }
}
