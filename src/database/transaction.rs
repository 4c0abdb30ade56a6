use sqlx::{Postgres, Transaction};
use std::fmt::Display;

/// Commit `tx` when `result` is Ok, otherwise roll it back and return the
/// original error. The connection returns to the pool on every path.
pub async fn finish<T, E>(tx: Transaction<'_, Postgres>, result: Result<T, E>) -> Result<T, E>
where
    E: From<sqlx::Error> + Display,
{
    match result {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to commit transaction");
                E::from(e)
            })?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(
                    error = %rollback_err,
                    original_error = %err,
                    "Failed to rollback transaction"
                );
            }
            Err(err)
        }
    }
}
