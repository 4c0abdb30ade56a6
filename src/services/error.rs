use std::collections::HashMap;
use thiserror::Error;

use crate::auth::{CredentialError, Forbidden, TokenIssueError};
use crate::storage::StorageError;

/// Which uniqueness or referential rule a write collided with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Email,
    NationalId,
    ReferencedData,
}

impl ConflictKind {
    pub fn message(self) -> &'static str {
        match self {
            ConflictKind::Email => "Email already registered.",
            ConflictKind::NationalId => "National ID/Passport number already registered.",
            ConflictKind::ReferencedData => {
                "Cannot delete user because they have associated data. Please ensure all related records are removed first."
            }
        }
    }
}

/// Errors raised by the identity, dataset and moderation services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(#[from] Forbidden),

    #[error("{0}")]
    NotFound(String),

    #[error("{}", .0.message())]
    Conflict(ConflictKind),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Token(#[from] TokenIssueError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn missing_fields(message: impl Into<String>, fields: &[&str]) -> Self {
        let field_errors = fields
            .iter()
            .map(|field| (field.to_string(), "This field is required".to_string()))
            .collect();
        ServiceError::Validation {
            message: message.into(),
            field_errors: Some(field_errors),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    /// Map a unique or foreign-key violation from the driver onto a conflict
    /// kind; anything else stays a database error.
    pub fn from_constraint(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                match db_err.constraint() {
                    Some("users_email_key") => return ServiceError::Conflict(ConflictKind::Email),
                    Some("users_national_id_passport_key") => {
                        return ServiceError::Conflict(ConflictKind::NationalId)
                    }
                    _ => {}
                }
            }
            if db_err.is_foreign_key_violation() {
                return ServiceError::Conflict(ConflictKind::ReferencedData);
            }
        }
        ServiceError::Database(err)
    }
}
