//! HTTP request handlers for the stream API.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::state::StreamState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status message.
    pub status: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
}

/// Process and store status.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Resident memory of the process in bytes.
    pub allocated_memory: u64,
    /// Number of entries in the store.
    pub logs_stored: usize,
    /// Number of connected viewers.
    pub clients: usize,
    /// Properties dropped from the index.
    pub blacklisted: Vec<String>,
}

/// Handle GET /api/health - health check endpoint.
pub async fn health_check(State(state): State<Arc<StreamState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

/// Handle GET /api/status - memory, store size and index state.
pub async fn get_status(State(state): State<Arc<StreamState>>) -> Json<StatusResponse> {
    let coordinator = state.coordinator();
    let status = coordinator.status();

    Json(StatusResponse {
        allocated_memory: status.allocated_memory,
        logs_stored: status.logs_stored,
        clients: coordinator.client_count(),
        blacklisted: coordinator.store().blacklist(),
    })
}
