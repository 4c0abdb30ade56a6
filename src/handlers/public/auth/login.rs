// handlers/public/auth/login.rs - POST /api/login handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{AuthSession, LoginRequest};
use crate::state::AppState;

/**
 * POST /api/login - Authenticate with email and password
 *
 * Expected Input:
 * ```json
 * { "email": "ada@example.com", "password": "..." }
 * ```
 *
 * Expected Output (Success):
 * ```json
 * {
 *   "success": true,
 *   "data": {
 *     "token": "eyJhbGciOiJIUzI1NiI...",
 *     "user": { "id": 1, "email": "ada@example.com", "role": "user", ... },
 *     "expires_in": 3600
 *   }
 * }
 * ```
 *
 * Unknown email and wrong password both answer 401 `INVALID_CREDENTIALS`.
 */
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<AuthSession> {
    let Json(request) = payload?;
    let session = state.identities.authenticate(request).await?;
    Ok(ApiResponse::success(session))
}
