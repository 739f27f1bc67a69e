//! HTTP transport for device relays and control surfaces.
//!
//! This module provides an HTTP server that:
//! - Accepts decoded readings via POST /samples
//! - Accepts session commands via POST /session/start and /session/stop
//! - Forwards everything to the monitor loop without waiting for it
//!
//! # Architecture
//!
//! ```text
//! Device relay ──→ POST /samples ──→ channel ──→ Monitor loop ──→ SessionEngine
//! Control UI   ──→ POST /session/* ─────┘
//! ```

use crate::runtime::{MonitorCommand, MonitorEvent};
use crate::telemetry::types::{ConnectionStatus, RawSample};
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use crossbeam_channel::Sender;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Shared server state
pub struct ServerState {
    events: Sender<MonitorEvent>,
}

/// Response for accepted requests
#[derive(Debug, Clone, Serialize)]
pub struct QueuedResponse {
    pub status: String,
    pub message: String,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiResult = Result<(StatusCode, Json<QueuedResponse>), (StatusCode, Json<ErrorResponse>)>;

impl ServerState {
    fn forward(&self, event: MonitorEvent, message: &str) -> ApiResult {
        self.events.send(event).map_err(|_| {
            tracing::error!("Monitor loop is gone; dropping request");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "Monitor is not running".to_string(),
                    code: "MONITOR_UNAVAILABLE".to_string(),
                }),
            )
        })?;

        Ok((
            StatusCode::ACCEPTED,
            Json(QueuedResponse {
                status: "queued".to_string(),
                message: message.to_string(),
            }),
        ))
    }
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /samples
///
/// Queues one reading. Validation happens on the monitor loop, so a
/// structurally decodable but invalid reading is still accepted here.
async fn ingest_sample(
    State(state): State<Arc<ServerState>>,
    Json(raw): Json<Option<RawSample>>,
) -> ApiResult {
    state.forward(MonitorEvent::Sample(raw), "Sample queued")
}

/// POST /session/start
async fn start_session(State(state): State<Arc<ServerState>>) -> ApiResult {
    state.forward(
        MonitorEvent::Command(MonitorCommand::StartSession),
        "Start requested",
    )
}

/// POST /session/stop
async fn stop_session(State(state): State<Arc<ServerState>>) -> ApiResult {
    state.forward(
        MonitorEvent::Command(MonitorCommand::StopSession),
        "Stop requested",
    )
}

/// Build the router without binding a socket.
pub fn router(events: Sender<MonitorEvent>) -> Router {
    let state = Arc::new(ServerState { events });

    Router::new()
        .route("/health", get(health))
        .route("/samples", post(ingest_sample))
        .route("/session/start", post(start_session))
        .route("/session/stop", post(stop_session))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    events: Sender<MonitorEvent>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(events.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Monitor server listening on http://{}", actual_addr);
    let _ = events.send(MonitorEvent::Connectivity(ConnectionStatus::Connected));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
        let _ = events.send(MonitorEvent::Connectivity(ConnectionStatus::Disconnected));
    });

    Ok((actual_addr, shutdown_tx))
}
