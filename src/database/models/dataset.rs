use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::types::{ApprovalStatus, Visibility};

/// `datasets` row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Dataset {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub filename: String,
    pub filetype: String,
    pub size: String,
    pub category: String,
    #[sqlx(try_from = "i16")]
    pub approval_status: ApprovalStatus,
    #[sqlx(rename = "is_public", try_from = "bool")]
    pub visibility: Visibility,
    pub downloads: i64,
    pub starred: bool,
    pub last_updated: DateTime<Utc>,
}

/// Dataset joined with its optional metadata row and its uploader
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DatasetDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub dataset: Dataset,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub uploader_first_name: String,
    pub uploader_last_name: String,
    pub uploader_email: String,
    pub uploader_profile_pic: Option<String>,
}

/// Base SELECT for `DatasetDetail`. Metadata is outer-joined: a dataset
/// without a metadata row still reads back with null description/tags.
pub const DATASET_DETAIL_SELECT: &str = r#"
    SELECT
        d.id, d.user_id, d.name, d.filename, d.filetype, d.size, d.category,
        d.approval_status, d.is_public, d.downloads, d.starred, d.last_updated,
        dm.description, dm.tags,
        u.first_name AS uploader_first_name,
        u.last_name AS uploader_last_name,
        u.email AS uploader_email,
        u.profile_picture_url AS uploader_profile_pic
    FROM datasets d
    LEFT JOIN dataset_metadata dm ON dm.dataset_id = d.id
    JOIN users u ON u.id = d.user_id
"#;
