use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use ticketbooth_core::{SessionCounts, TicketSessionRegistry};
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    registry: Arc<TicketSessionRegistry>,
    transport_mode: &'static str,
}

impl HealthState {
    pub fn new(registry: Arc<TicketSessionRegistry>, transport_mode: &'static str) -> Self {
        Self { registry, transport_mode }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub gateway: HealthCheck,
    pub sessions: SessionCounts,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

/// Always 200 while the process is up. A noop gateway is reported as
/// degraded so a misconfigured deployment is visible from the outside.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let gateway = if state.transport_mode == "noop" {
        HealthCheck {
            status: "degraded",
            detail: "gateway transport is noop; no events will be received".to_string(),
        }
    } else {
        HealthCheck { status: "ready", detail: format!("{} transport", state.transport_mode) }
    };

    let payload = HealthResponse {
        status: gateway.status,
        service: HealthCheck {
            status: "ready",
            detail: "ticketbooth-server runtime initialized".to_string(),
        },
        gateway,
        sessions: state.registry.counts(),
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
