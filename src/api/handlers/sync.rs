//! Library sync handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::api::{AdminUser, ApiState};
use crate::error::Result;
use crate::sync::SyncStats;

#[derive(Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    pub stats: SyncStats,
}

/// Pull Readarr's library into the local store. Admin only.
pub async fn sync_readarr(
    State(state): State<Arc<ApiState>>,
    AdminUser(admin): AdminUser,
) -> Result<Json<SyncResponse>> {
    info!(admin_id = admin.id, "Sync requested");
    let stats = state.reconciler.run().await?;

    Ok(Json(SyncResponse {
        success: true,
        message: format!(
            "Synced {} books from Readarr: {} new, {} updated, {} skipped",
            stats.total_books, stats.new_books_added, stats.books_updated, stats.skipped
        ),
        stats,
    }))
}
