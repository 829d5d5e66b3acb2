//! Axum server setup and router configuration.

use crate::api::extractors::MAX_WEBHOOK_BODY;
use crate::api::{orders, webhook};
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
///
/// The webhook path is fixed for the lifetime of the router; changing it
/// takes a restart.
pub fn build_router(state: AppState, webhook_path: &str) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .route(
            webhook_path,
            post(webhook::receive_webhook).layer(DefaultBodyLimit::max(MAX_WEBHOOK_BODY)),
        )
        .merge(orders::router())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
