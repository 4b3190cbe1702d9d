//! HTTP API server module
//!
//! JSON REST API consumed by the dashboard frontend, plus the cron
//! endpoints an external scheduler can call.

pub mod auth;
pub mod handlers;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::db::Database;
use crate::reports::ReportService;
use crate::scheduler::SharedSchedulerState;

pub use auth::SessionStore;
pub use routes::create_router;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub sessions: SessionStore,
    pub reports: ReportService,
    /// Written by the in-process report scheduler, read by the status endpoint
    pub scheduler: SharedSchedulerState,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig, reports: ReportService, scheduler: SharedSchedulerState) -> Self {
        let sessions = SessionStore::new(config.session_ttl_hours);
        Self {
            db,
            config: Arc::new(config),
            sessions,
            reports,
            scheduler,
        }
    }
}

/// Full application router with CORS and request tracing
pub fn build_app(state: AppState) -> axum::Router {
    // Configure CORS for cross-origin requests
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state).layer(cors).layer(TraceLayer::new_for_http())
}

/// Start the HTTP API server
///
/// SECURITY: binding to 0.0.0.0 exposes the server to the network.
pub async fn start_server(state: AppState) -> Result<(), String> {
    let host = state.config.api_host.clone();
    let port = state.config.api_port;
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| format!("Invalid API address {}:{}: {}", host, port, e))?;

    // Security warning for network exposure
    if host == "0.0.0.0" {
        warn!("[API] Server binding to 0.0.0.0 - accessible from network");
        if state.config.cron_secret.is_none() {
            warn!("[API] CRON_SECRET is not set; cron endpoints will reject every call");
        }
    }

    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind HTTP server on {}: {}", addr, e))?;

    info!("[API] Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("HTTP server error: {}", e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("[API] Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("[API] Shutdown signal received");
}
