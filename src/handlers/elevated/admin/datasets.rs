// handlers/elevated/admin/datasets.rs - moderation queue and dataset removal

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Extension, Json,
};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::database::models::DatasetDetail;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{ModerationAction, StatusChangeRequest};
use crate::state::AppState;

/// GET /api/admin/datasets/pending - Datasets awaiting review, oldest first
pub async fn pending_get(State(state): State<AppState>) -> ApiResult<Vec<DatasetDetail>> {
    let datasets = state.moderation.list_pending().await?;
    Ok(ApiResponse::success(datasets))
}

/**
 * PATCH /api/admin/datasets/:id/status - Approve or reject
 *
 * Expected Input:
 * ```json
 * { "action": "approve" }   // or "reject"
 * ```
 *
 * Repeating an action is not an error. Unknown id answers 404.
 */
pub async fn status_patch(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StatusChangeRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Path(id) = path?;
    let Json(request) = payload?;
    let action = ModerationAction::parse(request.action.as_deref())?;

    let status = match action {
        ModerationAction::Approve => state.moderation.approve(id).await?,
        ModerationAction::Reject => state.moderation.reject(id).await?,
    };
    tracing::debug!(dataset_id = id, admin_id = admin.id, "Status set to {:?}", status);

    Ok(ApiResponse::success(json!({
        "id": id,
        "approval_status": status,
        "message": format!("Dataset {} successfully!", action.past_tense())
    })))
}

/// DELETE /api/admin/datasets/:id - Remove dataset, metadata and file
pub async fn dataset_delete(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = path?;
    state.datasets.delete(id, &admin).await?;
    Ok(ApiResponse::success(json!({
        "id": id,
        "message": "Dataset and associated metadata/file deleted successfully."
    })))
}
