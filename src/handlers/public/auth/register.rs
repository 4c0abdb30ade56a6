// handlers/public/auth/register.rs - POST /api/signup handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{AuthSession, SignupRequest};
use crate::state::AppState;

/**
 * POST /api/signup - Register a new account (role is always `user`)
 *
 * Expected Input:
 * ```json
 * {
 *   "first_name": "Ada", "last_name": "Lovelace",      // Required
 *   "email": "ada@example.com", "password": "...",     // Required
 *   "agreed": true,                                    // Required, must be true
 *   "gender": "...", "national_id_passport": "...",    // Optional
 *   "country": "...", "institution": "...", "official_work": "..."
 * }
 * ```
 *
 * Responds 201 with the same session payload as login.
 * 409 when the email or national ID is already registered.
 */
pub async fn register_post(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<AuthSession> {
    let Json(request) = payload?;
    let session = state.identities.register(request).await?;
    Ok(ApiResponse::created(session))
}
