use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::types::Role;

/// Column list for `users` reads; keeps every query selecting the same shape
pub const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, gender, \
     national_id_passport, country, institution, official_work, role, profile_picture_url, created_at";

/// Full `users` row, including the password hash. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<String>,
    pub national_id_passport: Option<String>,
    pub country: Option<String>,
    pub institution: Option<String>,
    pub official_work: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub profile_picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// User record as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<String>,
    pub national_id_passport: Option<String>,
    pub country: Option<String>,
    pub institution: Option<String>,
    pub official_work: Option<String>,
    pub role: Role,
    pub profile_picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            gender: user.gender,
            national_id_passport: user.national_id_passport,
            country: user.country,
            institution: user.institution,
            official_work: user.official_work,
            role: user.role,
            profile_picture_url: user.profile_picture_url,
            created_at: user.created_at,
        }
    }
}

/// Aggregate counts for the dashboard
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlatformStats {
    pub total_users: i64,
    pub total_approved_datasets: i64,
}
