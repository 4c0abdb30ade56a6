//! Dataset repository: uploads, reads, owner/admin edits and deletion.
//!
//! Multi-table writes run in one transaction. Files are written before the
//! transaction begins and removed again if it fails.

use serde::Deserialize;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

use super::error::{ServiceError, ServiceResult};
use super::fields::{double_option, non_blank_patch, nullable, nullable_patch, required};
use crate::auth::{authorize_owner_or_role, authorize_role, AuthUser, Forbidden};
use crate::database::models::{Dataset, DatasetDetail, PlatformStats, DATASET_DETAIL_SELECT};
use crate::database::transaction;
use crate::database::UpdateBuilder;
use crate::storage::{dataset_filename, file_type_for, format_bytes, FileStore, StorageError};
use crate::types::{ApprovalStatus, Role, Visibility};

/// Text fields of a multipart upload, before validation
#[derive(Debug, Default, Clone)]
pub struct NewDataset {
    pub name: Option<String>,
    pub category: Option<String>,
    pub visibility: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
}

/// The uploaded file part
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub bytes: Vec<u8>,
}

/// Partial edit of a dataset. `description`/`tags` accept `null` to clear.
#[derive(Debug, Default, Deserialize)]
pub struct DatasetPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub is_public: Option<bool>,
    pub visibility: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub tags: Option<Option<String>>,
}

/// Search parameters for the public feed
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FeedFilters {
    pub q: Option<String>,
    pub category: Option<String>,
    pub file_type: Option<String>,
    pub limit: Option<i64>,
}

/// File contents handed back by a download
#[derive(Debug, Clone)]
pub struct DatasetFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

struct ValidatedUpload {
    name: String,
    category: String,
    visibility: Visibility,
    description: Option<String>,
    tags: Option<String>,
}

struct DatasetChanges {
    name: Option<String>,
    category: Option<String>,
    visibility: Option<Visibility>,
    description: Option<Option<String>>,
    tags: Option<Option<String>>,
}

impl DatasetChanges {
    fn from_patch(patch: DatasetPatch) -> ServiceResult<Self> {
        let visibility = match (patch.is_public, patch.visibility.as_deref()) {
            (Some(is_public), _) => Some(Visibility::from(is_public)),
            (None, Some(raw)) => Some(
                Visibility::parse(raw)
                    .ok_or_else(|| ServiceError::validation("Visibility must be 'public' or 'private'."))?,
            ),
            (None, None) => None,
        };

        let changes = Self {
            name: non_blank_patch("name", patch.name)?,
            category: non_blank_patch("category", patch.category)?,
            visibility,
            description: nullable_patch(patch.description),
            tags: nullable_patch(patch.tags),
        };
        if !changes.touches_dataset() && !changes.touches_metadata() {
            return Err(ServiceError::validation("No fields provided for update."));
        }
        Ok(changes)
    }

    fn touches_dataset(&self) -> bool {
        self.name.is_some() || self.category.is_some() || self.visibility.is_some()
    }

    fn touches_metadata(&self) -> bool {
        self.description.is_some() || self.tags.is_some()
    }
}

fn validate_upload(fields: NewDataset, file: Option<&IncomingFile>) -> ServiceResult<ValidatedUpload> {
    if file.is_none() {
        return Err(ServiceError::missing_fields("No dataset file uploaded.", &["datasetFile"]));
    }

    let (Some(name), Some(category), Some(raw_visibility)) =
        (required(fields.name), required(fields.category), required(fields.visibility))
    else {
        return Err(ServiceError::missing_fields(
            "Missing required dataset information (name, category, or visibility).",
            &["datasetName", "category", "is_public"],
        ));
    };
    let visibility = Visibility::parse(&raw_visibility)
        .ok_or_else(|| ServiceError::validation("Visibility must be 'public' or 'private'."))?;

    Ok(ValidatedUpload {
        name,
        category,
        visibility,
        description: nullable(fields.description),
        tags: nullable(fields.tags),
    })
}

/// Escape `%`, `_` and `\` so user text matches literally inside ILIKE
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn dataset_not_found() -> ServiceError {
    ServiceError::not_found("Dataset not found.")
}

#[derive(Clone)]
pub struct DatasetRepository {
    pool: PgPool,
    files: Arc<dyn FileStore>,
}

impl DatasetRepository {
    pub fn new(pool: PgPool, files: Arc<dyn FileStore>) -> Self {
        Self { pool, files }
    }

    /// Store the file, then insert the dataset and its metadata row in one
    /// transaction. The status is always Pending.
    pub async fn upload(
        &self,
        owner: &AuthUser,
        fields: NewDataset,
        file: Option<IncomingFile>,
    ) -> ServiceResult<Dataset> {
        let upload = validate_upload(fields, file.as_ref())?;
        let Some(file) = file else {
            return Err(ServiceError::missing_fields("No dataset file uploaded.", &["datasetFile"]));
        };

        let filename = dataset_filename(&file.original_name);
        let filetype = file_type_for(&file.original_name);
        let size = format_bytes(file.bytes.len() as u64);

        self.files.put(&filename, &file.bytes).await?;

        let inserted = match self.pool.begin().await {
            Ok(mut tx) => {
                let result = insert_dataset(&mut tx, owner.id, &upload, &filename, filetype, &size).await;
                transaction::finish(tx, result).await
            }
            Err(e) => Err(ServiceError::from(e)),
        };

        match inserted {
            Ok(dataset) => {
                tracing::info!(
                    dataset_id = dataset.id,
                    user_id = owner.id,
                    "Dataset uploaded and submitted for review: {}",
                    filename
                );
                Ok(dataset)
            }
            Err(err) => {
                if let Err(e) = self.files.remove(&filename).await {
                    tracing::warn!(user_id = owner.id, "Could not remove upload {} after failure: {}", filename, e);
                }
                Err(err)
            }
        }
    }

    /// Single dataset with metadata and uploader. Private datasets are
    /// readable only by their owner and admins.
    pub async fn get(&self, dataset_id: i64, caller: &AuthUser) -> ServiceResult<DatasetDetail> {
        let detail = fetch_detail(&self.pool, dataset_id)
            .await?
            .ok_or_else(dataset_not_found)?;

        if !detail.dataset.visibility.is_public() {
            authorize_owner_or_role(caller, detail.dataset.user_id, Role::Admin)
                .map_err(|_| Forbidden::PrivateDataset)?;
        }
        Ok(detail)
    }

    /// Every dataset owned by `owner_id`, any status, newest first
    pub async fn list_by_owner(&self, owner_id: i64) -> ServiceResult<Vec<DatasetDetail>> {
        let sql = format!(
            "{} WHERE d.user_id = $1 ORDER BY d.last_updated DESC, d.id DESC",
            DATASET_DETAIL_SELECT
        );
        Ok(sqlx::query_as::<_, DatasetDetail>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Approved public datasets, newest first, with optional text search over
    /// name/description/tags and exact category/file type filters.
    pub async fn list_public_approved(&self, limit: i64, filters: &FeedFilters) -> ServiceResult<Vec<DatasetDetail>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(DATASET_DETAIL_SELECT);
        query
            .push(" WHERE d.approval_status = ")
            .push_bind(ApprovalStatus::Approved.code())
            .push(" AND d.is_public = TRUE");

        if let Some(q) = filters.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = like_pattern(q);
            query
                .push(" AND (d.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR dm.description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR dm.tags ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(category) = filters.category.as_deref().filter(|c| !c.is_empty()) {
            query.push(" AND d.category = ").push_bind(category.to_string());
        }
        if let Some(file_type) = filters.file_type.as_deref().filter(|t| !t.is_empty()) {
            query.push(" AND d.filetype = ").push_bind(file_type.to_string());
        }

        query
            .push(" ORDER BY d.last_updated DESC, d.id DESC LIMIT ")
            .push_bind(limit.max(0));

        Ok(query.build_query_as::<DatasetDetail>().fetch_all(&self.pool).await?)
    }

    /// Partial edit by the owner or an admin. Owners may only edit while the
    /// dataset is Pending or Rejected. The status itself never changes here.
    pub async fn update(&self, dataset_id: i64, caller: &AuthUser, patch: DatasetPatch) -> ServiceResult<DatasetDetail> {
        let changes = DatasetChanges::from_patch(patch)?;

        let mut tx = self.pool.begin().await?;
        let result = update_dataset(&mut tx, dataset_id, caller, changes).await;
        let detail = transaction::finish(tx, result).await?;

        tracing::info!(dataset_id, user_id = caller.id, "Dataset updated");
        Ok(detail)
    }

    /// Remove metadata, dataset row and file. Rows go in one transaction; the
    /// file is unlinked after commit and a failure there is only logged.
    pub async fn delete(&self, dataset_id: i64, caller: &AuthUser) -> ServiceResult<()> {
        authorize_role(caller, Role::Admin)?;

        let mut tx = self.pool.begin().await?;
        let result = delete_rows(&mut tx, dataset_id).await;
        let filename = transaction::finish(tx, result).await?;

        if let Err(e) = self.files.remove(&filename).await {
            tracing::warn!(dataset_id, "Dataset rows deleted but file {} was not removed: {}", filename, e);
        }

        tracing::info!(dataset_id, admin_id = caller.id, "Dataset deleted");
        Ok(())
    }

    /// Atomic `downloads = downloads + 1`
    pub async fn record_download(&self, dataset_id: i64) -> ServiceResult<()> {
        let result = sqlx::query("UPDATE datasets SET downloads = downloads + 1 WHERE id = $1")
            .bind(dataset_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(dataset_not_found());
        }
        Ok(())
    }

    /// Read access check, file read, then the counter increment
    pub async fn download(&self, dataset_id: i64, caller: &AuthUser) -> ServiceResult<DatasetFile> {
        let detail = self.get(dataset_id, caller).await?;
        let filename = detail.dataset.filename;

        let bytes = self.files.read(&filename).await.map_err(|e| {
            if matches!(e, StorageError::NotFound(_)) {
                tracing::error!(dataset_id, "Backing file {} is missing", filename);
            }
            ServiceError::from(e)
        })?;

        self.record_download(dataset_id).await?;
        Ok(DatasetFile { filename, bytes })
    }

    /// Flip the starred flag in one statement and return the new value
    pub async fn toggle_star(&self, dataset_id: i64) -> ServiceResult<bool> {
        sqlx::query_scalar("UPDATE datasets SET starred = NOT starred WHERE id = $1 RETURNING starred")
            .bind(dataset_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(dataset_not_found)
    }

    pub async fn stats(&self) -> ServiceResult<PlatformStats> {
        Ok(sqlx::query_as::<_, PlatformStats>(
            "SELECT \
                (SELECT COUNT(*) FROM users) AS total_users, \
                (SELECT COUNT(*) FROM datasets WHERE approval_status = $1) AS total_approved_datasets",
        )
        .bind(ApprovalStatus::Approved.code())
        .fetch_one(&self.pool)
        .await?)
    }
}

async fn fetch_detail<'e, E>(executor: E, dataset_id: i64) -> Result<Option<DatasetDetail>, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    let sql = format!("{} WHERE d.id = $1", DATASET_DETAIL_SELECT);
    sqlx::query_as::<_, DatasetDetail>(&sql)
        .bind(dataset_id)
        .fetch_optional(executor)
        .await
}

async fn insert_dataset(
    conn: &mut PgConnection,
    owner_id: i64,
    upload: &ValidatedUpload,
    filename: &str,
    filetype: &str,
    size: &str,
) -> ServiceResult<Dataset> {
    let dataset = sqlx::query_as::<_, Dataset>(
        "INSERT INTO datasets (user_id, name, filename, filetype, size, category, approval_status, is_public) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING id, user_id, name, filename, filetype, size, category, approval_status, \
                   is_public, downloads, starred, last_updated",
    )
    .bind(owner_id)
    .bind(&upload.name)
    .bind(filename)
    .bind(filetype)
    .bind(size)
    .bind(&upload.category)
    .bind(ApprovalStatus::Pending.code())
    .bind(upload.visibility.is_public())
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("INSERT INTO dataset_metadata (dataset_id, description, tags) VALUES ($1, $2, $3)")
        .bind(dataset.id)
        .bind(&upload.description)
        .bind(&upload.tags)
        .execute(&mut *conn)
        .await?;

    Ok(dataset)
}

async fn update_dataset(
    conn: &mut PgConnection,
    dataset_id: i64,
    caller: &AuthUser,
    changes: DatasetChanges,
) -> ServiceResult<DatasetDetail> {
    let current: Option<(i64, i16)> =
        sqlx::query_as("SELECT user_id, approval_status FROM datasets WHERE id = $1 FOR UPDATE")
            .bind(dataset_id)
            .fetch_optional(&mut *conn)
            .await?;
    let (owner_id, status_code) = current.ok_or_else(dataset_not_found)?;

    authorize_owner_or_role(caller, owner_id, Role::Admin)?;
    if !caller.is_admin() && status_code == ApprovalStatus::Approved.code() {
        return Err(Forbidden::ApprovedDatasetLocked.into());
    }

    let touches_metadata = changes.touches_metadata();
    if changes.touches_dataset() {
        let mut update = UpdateBuilder::new("datasets");
        update
            .set_if("name", changes.name)
            .set_if("category", changes.category)
            .set_if("is_public", changes.visibility.map(Visibility::is_public))
            .set_expr("last_updated", "NOW()");
        update.finish("id", dataset_id, "").build().execute(&mut *conn).await?;
    }

    if touches_metadata {
        // a missing metadata row is created; an existing one keeps the columns the patch omits
        sqlx::query(
            "INSERT INTO dataset_metadata (dataset_id, description, tags) VALUES ($1, $2, $3) \
             ON CONFLICT (dataset_id) DO UPDATE SET \
                description = CASE WHEN $4 THEN EXCLUDED.description ELSE dataset_metadata.description END, \
                tags = CASE WHEN $5 THEN EXCLUDED.tags ELSE dataset_metadata.tags END",
        )
        .bind(dataset_id)
        .bind(changes.description.clone().flatten())
        .bind(changes.tags.clone().flatten())
        .bind(changes.description.is_some())
        .bind(changes.tags.is_some())
        .execute(&mut *conn)
        .await?;
    }

    fetch_detail(&mut *conn, dataset_id)
        .await?
        .ok_or_else(dataset_not_found)
}

async fn delete_rows(conn: &mut PgConnection, dataset_id: i64) -> ServiceResult<String> {
    let filename: Option<String> = sqlx::query_scalar("SELECT filename FROM datasets WHERE id = $1 FOR UPDATE")
        .bind(dataset_id)
        .fetch_optional(&mut *conn)
        .await?;
    let filename = filename.ok_or_else(dataset_not_found)?;

    sqlx::query("DELETE FROM dataset_metadata WHERE dataset_id = $1")
        .bind(dataset_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM datasets WHERE id = $1")
        .bind(dataset_id)
        .execute(&mut *conn)
        .await?;

    Ok(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> IncomingFile {
        IncomingFile {
            original_name: "Sales.csv".to_string(),
            bytes: b"a,b\n".to_vec(),
        }
    }

    fn fields() -> NewDataset {
        NewDataset {
            name: Some("Sales".into()),
            category: Some("Finance".into()),
            visibility: Some("false".into()),
            description: Some("".into()),
            tags: None,
        }
    }

    #[test]
    fn upload_requires_file_and_core_fields() {
        assert!(matches!(validate_upload(fields(), None), Err(ServiceError::Validation { .. })));

        let mut missing_category = fields();
        missing_category.category = Some("  ".into());
        assert!(matches!(
            validate_upload(missing_category, Some(&file())),
            Err(ServiceError::Validation { .. })
        ));

        let mut bad_visibility = fields();
        bad_visibility.visibility = Some("sometimes".into());
        assert!(validate_upload(bad_visibility, Some(&file())).is_err());
    }

    #[test]
    fn upload_normalises_optional_metadata() {
        let upload = validate_upload(fields(), Some(&file())).unwrap();
        assert_eq!(upload.visibility, Visibility::Private);
        assert_eq!(upload.description, None);
        assert_eq!(upload.tags, None);
    }

    #[test]
    fn tags_only_patch_leaves_dataset_columns_alone() {
        let patch: DatasetPatch = serde_json::from_str(r#"{"tags": "a,b,c"}"#).unwrap();
        let changes = DatasetChanges::from_patch(patch).unwrap();
        assert!(!changes.touches_dataset());
        assert!(changes.touches_metadata());
        assert_eq!(changes.tags, Some(Some("a,b,c".to_string())));
        assert_eq!(changes.description, None);
    }

    #[test]
    fn visibility_patch_accepts_bool_or_word() {
        let by_bool: DatasetPatch = serde_json::from_str(r#"{"is_public": true}"#).unwrap();
        let by_word: DatasetPatch = serde_json::from_str(r#"{"visibility": "private"}"#).unwrap();
        assert_eq!(DatasetChanges::from_patch(by_bool).unwrap().visibility, Some(Visibility::Public));
        assert_eq!(DatasetChanges::from_patch(by_word).unwrap().visibility, Some(Visibility::Private));
    }

    #[test]
    fn empty_patch_is_rejected() {
        let patch: DatasetPatch = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            DatasetChanges::from_patch(patch),
            Err(ServiceError::Validation { .. })
        ));
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(like_pattern("sales"), "%sales%");
        assert_eq!(like_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }
}
