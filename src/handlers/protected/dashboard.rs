// handlers/protected/dashboard.rs - dashboard aggregates

use axum::extract::State;

use crate::database::models::{DatasetDetail, PlatformStats};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::FeedFilters;
use crate::state::AppState;

/// GET /api/stats - Total users and approved datasets
pub async fn stats_get(State(state): State<AppState>) -> ApiResult<PlatformStats> {
    let stats = state.datasets.stats().await?;
    Ok(ApiResponse::success(stats))
}

/// GET /api/recent-files - Latest approved public datasets
pub async fn recent_files_get(State(state): State<AppState>) -> ApiResult<Vec<DatasetDetail>> {
    let limit = state.config.api.recent_files_limit;
    let datasets = state
        .datasets
        .list_public_approved(limit, &FeedFilters::default())
        .await?;
    Ok(ApiResponse::success(datasets))
}
