// handlers/public/auth/password.rs - forgot/reset password handlers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{ForgotPasswordRequest, PasswordResetIssued, ResetPasswordRequest};
use crate::state::AppState;

/// POST /api/forgot-password - Issue a 15 minute reset token.
/// There is no mail delivery; the token is returned in the response.
pub async fn forgot_password_post(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> ApiResult<PasswordResetIssued> {
    let Json(request) = payload?;
    let issued = state.identities.forgot_password(request).await?;
    Ok(ApiResponse::success(issued))
}

/// POST /api/reset-password/:token - Consume a reset token and set a new password
pub async fn reset_password_post(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Path(token) = path?;
    let Json(request) = payload?;
    state.identities.reset_password(&token, request).await?;
    Ok(ApiResponse::success(json!({ "message": "Password has been reset successfully" })))
}
