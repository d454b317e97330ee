//! HTTP service for exporting MongoDB Atlas databases.
//!
//! # Routes
//! - `GET /api/items/validate?clusterUrl=` checks a connection string
//! - `GET /api/items/download/json?clusterUrl=` downloads the export
//! - `GET /api/items?clusterUrl=` lists the items collection
//! - `GET /api/items/{id}?clusterUrl=` fetches one item
//! - `GET /api/test` liveness probe
//!
//! Connection strings arrive per request; the service holds no connection
//! between requests.

pub mod config;
pub mod response;
pub mod routes;

use atlasdump_core::ExportService;
use axum::{Router, routing::get};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use config::ServerConfig;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<ExportService>,
}

impl AppState {
    /// Wraps a service for the router.
    pub fn new(service: ExportService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/test", get(routes::health))
        .route("/api/items", get(routes::list_items))
        .route("/api/items/validate", get(routes::validate))
        .route("/api/items/download/json", get(routes::download))
        .route("/api/items/{id}", get(routes::get_item))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the router on `listener` until Ctrl-C.
///
/// # Errors
/// Returns the I/O error that stopped the server.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(address) = listener.local_addr() {
        info!("Listening on http://{}", address);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
