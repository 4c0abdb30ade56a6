// handlers/elevated/admin/users.rs - admin user management

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Extension, Json,
};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::database::models::UserProfile;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{AdminCreateUserRequest, AdminUserPatch};
use crate::state::AppState;

/// GET /api/admin/users - Every account, without password hashes
pub async fn users_get(State(state): State<AppState>) -> ApiResult<Vec<UserProfile>> {
    let users = state.identities.list_all().await?;
    Ok(ApiResponse::success(users))
}

/// POST /api/admin/users - Create an account with an explicit role (`user` or `admin`)
pub async fn users_post(
    State(state): State<AppState>,
    payload: Result<Json<AdminCreateUserRequest>, JsonRejection>,
) -> ApiResult<UserProfile> {
    let Json(request) = payload?;
    let user = state.identities.admin_create(request).await?;
    Ok(ApiResponse::created(user))
}

/// PATCH /api/admin/users/:id - Edit any field including role.
/// An admin cannot demote themselves (403).
pub async fn user_patch(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<AdminUserPatch>, JsonRejection>,
) -> ApiResult<UserProfile> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    let user = state.identities.admin_update(id, &admin, patch).await?;
    Ok(ApiResponse::success(user))
}

/// DELETE /api/admin/users/:id - Delete another account.
/// 403 for the caller's own account, 409 while datasets reference the user.
pub async fn user_delete(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = path?;
    state.identities.delete(id, &admin).await?;
    Ok(ApiResponse::success(json!({ "id": id, "message": "User deleted successfully." })))
}
