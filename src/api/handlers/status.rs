//! Status and health check handlers.

use std::sync::Arc;

use axum::extract::State;
use chrono::Utc;
use serde::Serialize;

use crate::api::{ApiResponse, ApiResult, ApiState};
use crate::model::RequestStatus;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,

    pub version: String,

    /// Readarr base URL the daemon talks to.
    pub readarr_url: String,

    pub books: usize,

    /// Requests waiting for an admin.
    pub pending_requests: usize,

    pub uptime_secs: i64,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<ApiState>>) -> ApiResult<HealthResponse> {
    let books = state.store.count_books()?;
    let pending_requests = state.store.count_requests(Some(RequestStatus::Pending))?;

    Ok(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        readarr_url: state.readarr.base_url().to_string(),
        books,
        pending_requests,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    }))
}
