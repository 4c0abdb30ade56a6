// handlers/protected/profile.rs - self profile endpoints

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::database::models::UserProfile;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{PictureUpload, ProfilePatch};
use crate::state::AppState;

/// Multipart field carrying the picture
const PICTURE_FIELD: &str = "profilePicture";

/// GET /api/profile - The caller's own profile
pub async fn profile_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<UserProfile> {
    let profile = state.identities.profile(user.id).await?;
    Ok(ApiResponse::success(profile))
}

/// PUT /api/profile/update - Partial edit of the caller's own profile.
/// Email and role are not editable here.
pub async fn profile_update_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ProfilePatch>, JsonRejection>,
) -> ApiResult<UserProfile> {
    let Json(patch) = payload?;
    let profile = state.identities.update_profile(user.id, patch).await?;
    Ok(ApiResponse::success(profile))
}

/// POST /api/profile/picture - Replace the caller's picture (jpeg/png/gif)
pub async fn profile_picture_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Value> {
    let mut multipart = multipart?;
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(PICTURE_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        upload = Some(PictureUpload {
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let upload = upload.ok_or_else(|| {
        ApiError::validation_error("No profile picture file uploaded or invalid file type.", None)
    })?;
    let url = state.identities.set_profile_picture(user.id, upload).await?;

    Ok(ApiResponse::success(json!({
        "message": "Profile picture updated successfully!",
        "profile_picture_url": url
    })))
}
