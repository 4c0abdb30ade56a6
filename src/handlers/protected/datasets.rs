// handlers/protected/datasets.rs - dataset endpoints for authenticated users

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        multipart::MultipartRejection,
        Multipart, Path, Query, State,
    },
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::database::models::{Dataset, DatasetDetail};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{DatasetPatch, FeedFilters, IncomingFile, NewDataset};
use crate::state::AppState;

/// GET /api/datasets - Public feed of approved datasets
///
/// Query: `q` (name/description/tags), `category`, `file_type`, `limit`.
pub async fn feed_get(
    State(state): State<AppState>,
    query: Result<Query<FeedFilters>, QueryRejection>,
) -> ApiResult<Vec<DatasetDetail>> {
    let Query(filters) = query?;
    let max = state.config.api.max_feed_limit;
    let limit = filters.limit.unwrap_or(max).clamp(1, max);

    let datasets = state.datasets.list_public_approved(limit, &filters).await?;
    Ok(ApiResponse::success(datasets))
}

/// GET /api/user/datasets - The caller's own datasets, any status
pub async fn my_datasets_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<DatasetDetail>> {
    let datasets = state.datasets.list_by_owner(user.id).await?;
    Ok(ApiResponse::success(datasets))
}

/// GET /api/datasets/:id - One dataset with metadata and uploader.
/// 403 when private and the caller is neither owner nor admin.
pub async fn dataset_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<DatasetDetail> {
    let Path(id) = path?;
    let dataset = state.datasets.get(id, &user).await?;
    Ok(ApiResponse::success(dataset))
}

/// PATCH /api/datasets/:id - Edit name/category/visibility/description/tags
pub async fn dataset_patch(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<DatasetPatch>, JsonRejection>,
) -> ApiResult<DatasetDetail> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    let dataset = state.datasets.update(id, &user, patch).await?;
    Ok(ApiResponse::success(dataset))
}

/**
 * POST /api/datasets/upload - Multipart dataset upload
 *
 * Fields:
 * - `datasetFile`: the file (required)
 * - `datasetName`, `category`: text (required)
 * - `is_public` (true/false/1/0) or `visibility` (public/private): required
 * - `description`, `tags`: optional
 *
 * Any status supplied by the client is ignored; new datasets are Pending.
 */
pub async fn dataset_upload_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Dataset> {
    let mut multipart = multipart?;
    let mut fields = NewDataset::default();
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "datasetFile" => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                file = Some(IncomingFile {
                    original_name,
                    bytes: bytes.to_vec(),
                });
            }
            "datasetName" => fields.name = Some(field.text().await?),
            "category" => fields.category = Some(field.text().await?),
            "is_public" | "visibility" => fields.visibility = Some(field.text().await?),
            "description" => fields.description = Some(field.text().await?),
            "tags" => fields.tags = Some(field.text().await?),
            other => tracing::debug!("Ignoring upload field '{}'", other),
        }
    }

    let dataset = state.datasets.upload(&user, fields, file).await?;
    Ok(ApiResponse::created(dataset))
}

/// GET /api/datasets/:id/download - File bytes; counts the download
pub async fn dataset_download_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = path?;
    let file = state.datasets.download(id, &user).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file.filename))
        .map_err(|_| ApiError::internal_server_error("Invalid stored file name"))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}

/// POST /api/datasets/:id/star - Toggle the starred flag
pub async fn dataset_star_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = path?;
    // same read rule as GET: private datasets only for owner/admin
    state.datasets.get(id, &user).await?;
    let starred = state.datasets.toggle_star(id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "starred": starred })))
}
