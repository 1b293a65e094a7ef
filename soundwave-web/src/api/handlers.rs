//! HTTP request handlers
//!
//! Health, status, device listing and hub message endpoints.

use crate::api::server::AppContext;
use crate::source::capture;
use crate::state::StatsSnapshot;
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use soundwave_common::ChatMessage;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatusResponse {
    subscribers: usize,
    source: String,
    bit_depth: u16,
    sample_rate: u32,
    buffer_ms: u64,
    send_timeout_ms: u64,
    started_at: DateTime<Utc>,
    pipeline: StatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    devices: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    attempted: usize,
    delivered: usize,
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "soundwave-web".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Status Endpoint
// ============================================================================

/// GET /status - Subscriber count, capture settings and pipeline counters
pub async fn status(State(ctx): State<AppContext>) -> Json<ServiceStatusResponse> {
    Json(ServiceStatusResponse {
        subscribers: ctx.state.registry.len().await,
        source: ctx.config.source.to_string(),
        bit_depth: ctx.bit_depth.bits(),
        sample_rate: ctx.config.sample_rate,
        buffer_ms: ctx.config.buffer_ms,
        send_timeout_ms: ctx.config.send_timeout_ms,
        started_at: ctx.state.started_at,
        pipeline: ctx.state.stats.snapshot(),
    })
}

// ============================================================================
// Audio Device Endpoints
// ============================================================================

/// GET /audio/devices - List available audio input devices
pub async fn list_audio_devices() -> Result<Json<DeviceListResponse>, (StatusCode, Json<StatusResponse>)> {
    // Device enumeration can block on some hosts
    let result = tokio::task::spawn_blocking(capture::list_input_devices)
        .await
        .unwrap_or_else(|e| Err(crate::Error::Capture(format!("Device listing panicked: {}", e))));

    match result {
        Ok(devices) => {
            info!("Found {} input devices", devices.len());
            Ok(Json(DeviceListResponse { devices }))
        }
        Err(e) => {
            error!("Failed to list input devices: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse {
                    status: format!("error: {}", e),
                }),
            ))
        }
    }
}

// ============================================================================
// Hub Message Endpoint
// ============================================================================

/// POST /message - Relay a chat message to every subscriber
pub async fn post_message(
    State(ctx): State<AppContext>,
    Json(message): Json<ChatMessage>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<StatusResponse>)> {
    if message.user.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(StatusResponse {
                status: "error: user must not be empty".to_string(),
            }),
        ));
    }

    info!("Hub message from {}", message.user);
    let report = ctx.state.broadcaster.broadcast_message(message).await;

    Ok(Json(MessageResponse {
        attempted: report.attempted,
        delivered: report.delivered,
    }))
}
