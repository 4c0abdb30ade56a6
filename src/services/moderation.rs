//! Moderation engine: the Pending -> Approved/Rejected transitions.
//!
//! Every operation here is admin-only; the route layer enforces the role.

use serde::Deserialize;
use sqlx::PgPool;
use std::fmt;

use super::error::{ServiceError, ServiceResult};
use crate::database::models::{DatasetDetail, DATASET_DETAIL_SELECT};
use crate::types::ApprovalStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Approve,
    Reject,
}

impl ModerationAction {
    pub fn parse(raw: Option<&str>) -> ServiceResult<Self> {
        match raw {
            Some("approve") => Ok(ModerationAction::Approve),
            Some("reject") => Ok(ModerationAction::Reject),
            _ => Err(ServiceError::validation(
                "Invalid action specified. Must be \"approve\" or \"reject\".",
            )),
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            ModerationAction::Approve => "approved",
            ModerationAction::Reject => "rejected",
        }
    }

    pub fn target_status(self) -> ApprovalStatus {
        match self {
            ModerationAction::Approve => ApprovalStatus::Approved,
            ModerationAction::Reject => ApprovalStatus::Rejected,
        }
    }
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModerationAction::Approve => f.write_str("approve"),
            ModerationAction::Reject => f.write_str("reject"),
        }
    }
}

/// Body of `PATCH /api/admin/datasets/:id/status`
#[derive(Debug, Default, Deserialize)]
pub struct StatusChangeRequest {
    pub action: Option<String>,
}

#[derive(Clone)]
pub struct ModerationEngine {
    pool: PgPool,
}

impl ModerationEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Set the dataset's status. Re-applying the current status succeeds;
    /// an unknown id is NotFound.
    async fn apply(&self, dataset_id: i64, action: ModerationAction) -> ServiceResult<ApprovalStatus> {
        let status = action.target_status();
        let result = sqlx::query("UPDATE datasets SET approval_status = $1 WHERE id = $2")
            .bind(status.code())
            .bind(dataset_id)
            .execute(&self.pool)
            .await?;

        // Postgres counts matched rows, so zero means the id does not exist
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Dataset not found."));
        }

        tracing::info!(dataset_id, action = %action, "Dataset moderated");
        Ok(status)
    }

    pub async fn approve(&self, dataset_id: i64) -> ServiceResult<ApprovalStatus> {
        self.apply(dataset_id, ModerationAction::Approve).await
    }

    pub async fn reject(&self, dataset_id: i64) -> ServiceResult<ApprovalStatus> {
        self.apply(dataset_id, ModerationAction::Reject).await
    }

    /// Review queue, oldest first
    pub async fn list_pending(&self) -> ServiceResult<Vec<DatasetDetail>> {
        let sql = format!(
            "{} WHERE d.approval_status = $1 ORDER BY d.last_updated ASC, d.id ASC",
            DATASET_DETAIL_SELECT
        );
        Ok(sqlx::query_as::<_, DatasetDetail>(&sql)
            .bind(ApprovalStatus::Pending.code())
            .fetch_all(&self.pool)
            .await?)
    }
}
