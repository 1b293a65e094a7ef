//! HTTP server setup and routing
//!
//! Sets up the Axum HTTP server with the visualizer page, control endpoints
//! and the SSE frame stream.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::spectrum::BitDepth;
use crate::state::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub config: Arc<Config>,
    /// Bit depth of the running source (a WAV file may override the configured one)
    pub bit_depth: BitDepth,
}

/// Build the router with all routes attached
pub fn build_router(ctx: AppContext) -> Router {
    let visualizer = include_str!("visualizer.html");

    Router::new()
        // Visualizer page
        .route("/", get(move || async move { axum::response::Html(visualizer) }))

        // Health and status
        .route("/health", get(super::handlers::health))
        .route("/status", get(super::handlers::status))

        // Audio device discovery
        .route("/audio/devices", get(super::handlers::list_audio_devices))

        // Hub messages
        .route("/message", post(super::handlers::post_message))

        // SSE frame stream
        .route("/events", get(super::sse::event_stream))

        // Attach application context
        .with_state(ctx)

        .layer(TraceLayer::new_for_http())

        // Browsers load the visualizer from anywhere
        .layer(CorsLayer::permissive())
}

/// Serve `router` on `addr` until `shutdown` resolves
pub async fn run<F>(addr: SocketAddr, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("HTTP server stopped");
    Ok(())
}
