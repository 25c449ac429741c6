//! HTTP facade exposing tracker data to the browser client.
//!
//! All tracker routes live under `/api/jira`. A client first calls
//! `POST /connect`, then sends the returned session id in the
//! `X-Session-Id` header on every other request.

mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::info;

pub use error::ServerError;
pub use routes::{AppState, ConnectRequest, ConnectResponse, SESSION_HEADER};

use crate::api::HttpTransport;
use crate::config::Settings;
use crate::session::SessionRegistry;

/// Build the facade router.
pub fn router(state: AppState) -> Router {
    let jira = Router::new()
        .route("/connect", post(routes::connect).delete(routes::disconnect))
        .route("/projects", get(routes::projects))
        .route("/sprints/:project_key", get(routes::sprints))
        .route("/stories", get(routes::stories))
        .route("/story/:id", get(routes::story));

    Router::new()
        .route("/api/health", get(health))
        .nest("/api/jira", jira)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// Build the shared state from settings.
pub fn state_from_settings(settings: &Settings) -> anyhow::Result<AppState> {
    let transport = HttpTransport::new(settings.tracker.request_timeout())
        .context("failed to build HTTP client")?;
    let sessions = SessionRegistry::new(Arc::new(transport), settings.tracker.field_map())
        .with_limits(
            settings.server.session_idle_ttl(),
            settings.server.max_sessions,
        );

    Ok(AppState {
        sessions: Arc::new(sessions),
        verify_fields_on_connect: settings.tracker.verify_fields_on_connect,
    })
}

/// Bind and serve until Ctrl-C.
pub async fn serve(settings: &Settings, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(state_from_settings(settings)?);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(addr = %addr, "HTTP facade listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP facade error")?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
