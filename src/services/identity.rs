//! Identity & role registry: accounts, sessions, profiles and admin user management.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;

use super::error::{ConflictKind, ServiceError, ServiceResult};
use super::fields::{double_option, non_blank_patch, nullable, nullable_patch, required};
use crate::auth::password::verify_against_dummy;
use crate::auth::{hash_password, verify_password, AuthUser, Forbidden, TokenError, TokenService};
use crate::database::models::{User, UserProfile, USER_COLUMNS};
use crate::database::query_builder::UpdateBuilder;
use crate::storage::{profile_picture_filename, FileStore};
use crate::types::Role;

/// Public URL prefix the picture directory is served under
pub const PICTURE_URL_PREFIX: &str = "/profile_pictures/";

#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub gender: Option<String>,
    pub national_id_passport: Option<String>,
    pub country: Option<String>,
    pub institution: Option<String>,
    pub official_work: Option<String>,
    pub agreed: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminCreateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub gender: Option<String>,
    pub national_id_passport: Option<String>,
    pub country: Option<String>,
    pub institution: Option<String>,
    pub official_work: Option<String>,
    pub role: Option<String>,
}

/// Self-editable profile fields. Absent fields are left unchanged; for the
/// optional fields `null` or `""` clears the value.
#[derive(Debug, Default, Deserialize)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub gender: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub national_id_passport: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub country: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub institution: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub official_work: Option<Option<String>>,
}

/// Admin edit of any user: the profile fields plus email and role
#[derive(Debug, Default, Deserialize)]
pub struct AdminUserPatch {
    pub email: Option<String>,
    pub role: Option<String>,
    #[serde(flatten)]
    pub profile: ProfilePatch,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(alias = "newPassword")]
    pub new_password: Option<String>,
}

/// Token plus sanitized user, returned by signup and login
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: UserProfile,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordResetIssued {
    pub reset_token: String,
    pub expires_in: i64,
}

/// Uploaded profile picture as received from the multipart body
#[derive(Debug, Clone)]
pub struct PictureUpload {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Validated fields for a new `users` row
struct NewUser {
    first_name: String,
    last_name: String,
    email: String,
    password: String,
    gender: Option<String>,
    national_id_passport: Option<String>,
    country: Option<String>,
    institution: Option<String>,
    official_work: Option<String>,
    role: Role,
}

/// Column changes shared by the self and admin edit paths
#[derive(Default)]
struct UserChanges {
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    gender: Option<Option<String>>,
    national_id_passport: Option<Option<String>>,
    country: Option<Option<String>>,
    institution: Option<Option<String>>,
    official_work: Option<Option<String>>,
    role: Option<Role>,
}

impl UserChanges {
    fn from_profile(patch: ProfilePatch) -> ServiceResult<Self> {
        Ok(Self {
            first_name: non_blank_patch("first_name", patch.first_name)?,
            last_name: non_blank_patch("last_name", patch.last_name)?,
            gender: nullable_patch(patch.gender),
            national_id_passport: nullable_patch(patch.national_id_passport),
            country: nullable_patch(patch.country),
            institution: nullable_patch(patch.institution),
            official_work: nullable_patch(patch.official_work),
            ..Self::default()
        })
    }
}

fn parse_role(role: &str) -> ServiceResult<Role> {
    role.parse::<Role>()
        .map_err(|e| ServiceError::validation(e.to_string()))
}

fn picture_filename_from_url(url: &str) -> Option<&str> {
    url.strip_prefix(PICTURE_URL_PREFIX).filter(|name| !name.is_empty())
}

fn picture_extension(content_type: Option<&str>) -> Option<&'static str> {
    match content_type? {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Accounts, credentials and roles. Holds its own pool handle, token
/// service and picture store; constructed once at startup.
#[derive(Clone)]
pub struct IdentityRegistry {
    pool: PgPool,
    tokens: TokenService,
    pictures: Arc<dyn FileStore>,
    max_picture_bytes: usize,
}

impl IdentityRegistry {
    pub fn new(pool: PgPool, tokens: TokenService, pictures: Arc<dyn FileStore>, max_picture_bytes: usize) -> Self {
        Self {
            pool,
            tokens,
            pictures,
            max_picture_bytes,
        }
    }

    /// Self-service signup. Role is always `user`.
    pub async fn register(&self, req: SignupRequest) -> ServiceResult<AuthSession> {
        let first_name = required(req.first_name);
        let last_name = required(req.last_name);
        let email = required(req.email);
        let password = req.password.filter(|p| !p.is_empty());

        let (Some(first_name), Some(last_name), Some(email), Some(password), Some(agreed)) =
            (first_name, last_name, email, password, req.agreed)
        else {
            return Err(ServiceError::missing_fields(
                "Missing required fields (First Name, Last Name, Email, Password, and agreement to terms).",
                &["first_name", "last_name", "email", "password", "agreed"],
            ));
        };
        if !agreed {
            return Err(ServiceError::validation(
                "You must agree to the Terms of Service and Privacy Policy.",
            ));
        }

        let user = self
            .insert_user(NewUser {
                first_name,
                last_name,
                email,
                password,
                gender: nullable(req.gender),
                national_id_passport: nullable(req.national_id_passport),
                country: nullable(req.country),
                institution: nullable(req.institution),
                official_work: nullable(req.official_work),
                role: Role::User,
            })
            .await?;

        tracing::info!(user_id = user.id, "User registered: {}", user.email);
        self.session_for(user)
    }

    /// Email + password login. Unknown email and wrong password produce the
    /// same error.
    pub async fn authenticate(&self, req: LoginRequest) -> ServiceResult<AuthSession> {
        let (Some(email), Some(password)) = (required(req.email), req.password.filter(|p| !p.is_empty())) else {
            return Err(ServiceError::missing_fields(
                "Email and password are required.",
                &["email", "password"],
            ));
        };

        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;

        let Some(user) = user else {
            verify_against_dummy(&password);
            tracing::warn!("Login failed for {}", email);
            return Err(ServiceError::InvalidCredentials);
        };

        if !verify_password(&password, &user.password_hash)? {
            tracing::warn!(user_id = user.id, "Login failed for {}", email);
            return Err(ServiceError::InvalidCredentials);
        }

        tracing::info!(user_id = user.id, "User logged in");
        self.session_for(user)
    }

    /// Create a user with an explicit role. Caller must already be admin.
    pub async fn admin_create(&self, req: AdminCreateUserRequest) -> ServiceResult<UserProfile> {
        let first_name = required(req.first_name);
        let last_name = required(req.last_name);
        let email = required(req.email);
        let password = req.password.filter(|p| !p.is_empty());
        let role = required(req.role);

        let (Some(first_name), Some(last_name), Some(email), Some(password), Some(role)) =
            (first_name, last_name, email, password, role)
        else {
            return Err(ServiceError::missing_fields(
                "Missing required fields: first_name, last_name, email, password, and role.",
                &["first_name", "last_name", "email", "password", "role"],
            ));
        };
        let role = parse_role(&role)?;

        let user = self
            .insert_user(NewUser {
                first_name,
                last_name,
                email,
                password,
                gender: nullable(req.gender),
                national_id_passport: nullable(req.national_id_passport),
                country: nullable(req.country),
                institution: nullable(req.institution),
                official_work: nullable(req.official_work),
                role,
            })
            .await?;

        tracing::info!(user_id = user.id, role = %user.role, "User created by admin");
        Ok(user.into())
    }

    pub async fn list_all(&self) -> ServiceResult<Vec<UserProfile>> {
        let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
        let users = sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?;
        Ok(users.into_iter().map(UserProfile::from).collect())
    }

    pub async fn profile(&self, user_id: i64) -> ServiceResult<UserProfile> {
        self.find_by_id(user_id)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| ServiceError::not_found("Profile not found."))
    }

    /// Partial self-edit of profile fields
    pub async fn update_profile(&self, user_id: i64, patch: ProfilePatch) -> ServiceResult<UserProfile> {
        let changes = UserChanges::from_profile(patch)?;
        let user = self.apply_changes(user_id, changes).await?;
        tracing::info!(user_id, "Profile updated");
        Ok(user.into())
    }

    /// Admin edit of any user. An admin may not move their own role away from admin.
    pub async fn admin_update(
        &self,
        target_user_id: i64,
        caller: &AuthUser,
        patch: AdminUserPatch,
    ) -> ServiceResult<UserProfile> {
        let role = patch.role.as_deref().map(parse_role).transpose()?;
        if target_user_id == caller.id && role.is_some_and(|r| r != Role::Admin) {
            return Err(Forbidden::SelfDemotion.into());
        }

        let mut changes = UserChanges::from_profile(patch.profile)?;
        changes.email = non_blank_patch("email", patch.email)?;
        changes.role = role;

        let user = self.apply_changes(target_user_id, changes).await?;
        tracing::info!(user_id = target_user_id, admin_id = caller.id, "User updated by admin");
        Ok(user.into())
    }

    /// Delete another user. Blocked for the caller's own account and while
    /// any dataset still references the user.
    pub async fn delete(&self, target_user_id: i64, caller: &AuthUser) -> ServiceResult<()> {
        if target_user_id == caller.id {
            return Err(Forbidden::SelfDelete.into());
        }

        let deleted: Option<(Option<String>,)> =
            sqlx::query_as("DELETE FROM users WHERE id = $1 RETURNING profile_picture_url")
                .bind(target_user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(ServiceError::from_constraint)?;

        let Some((picture_url,)) = deleted else {
            return Err(ServiceError::not_found("User not found."));
        };

        if let Some(filename) = picture_url.as_deref().and_then(picture_filename_from_url) {
            if let Err(e) = self.pictures.remove(filename).await {
                tracing::warn!(user_id = target_user_id, "Failed to remove profile picture {}: {}", filename, e);
            }
        }

        tracing::info!(user_id = target_user_id, admin_id = caller.id, "User deleted");
        Ok(())
    }

    /// Issue a short-lived reset token. Delivery is the caller's concern;
    /// the token is returned directly.
    pub async fn forgot_password(&self, req: ForgotPasswordRequest) -> ServiceResult<PasswordResetIssued> {
        let Some(email) = required(req.email) else {
            return Err(ServiceError::missing_fields("Email is required.", &["email"]));
        };

        let user_id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;
        let user_id = user_id.ok_or_else(|| ServiceError::not_found("User not found"))?;

        let reset_token = self.tokens.issue_reset(user_id)?;
        tracing::info!(user_id, "Password reset token issued");
        Ok(PasswordResetIssued {
            reset_token,
            expires_in: self.tokens.reset_ttl().num_seconds(),
        })
    }

    pub async fn reset_password(&self, token: &str, req: ResetPasswordRequest) -> ServiceResult<()> {
        let Some(new_password) = req.new_password.filter(|p| !p.is_empty()) else {
            return Err(ServiceError::missing_fields("New password is required", &["new_password"]));
        };

        let claims = self.tokens.verify_reset(token).map_err(|e| match e {
            TokenError::Expired => ServiceError::validation("Password reset token has expired"),
            TokenError::Invalid => ServiceError::validation("Invalid password reset token"),
        })?;

        let password_hash = hash_password(&new_password)?;
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(&password_hash)
            .bind(claims.sub)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("User not found"));
        }

        tracing::info!(user_id = claims.sub, "Password reset");
        Ok(())
    }

    /// Replace the caller's profile picture. Returns the new public URL.
    pub async fn set_profile_picture(&self, user_id: i64, upload: PictureUpload) -> ServiceResult<String> {
        if upload.bytes.is_empty() {
            return Err(ServiceError::validation(
                "No profile picture file uploaded or invalid file type.",
            ));
        }
        let Some(extension) = picture_extension(upload.content_type.as_deref()) else {
            return Err(ServiceError::validation("Only images (jpeg, jpg, png, gif) are allowed!"));
        };
        if upload.bytes.len() > self.max_picture_bytes {
            return Err(ServiceError::validation(format!(
                "File too large. Maximum size is {}.",
                crate::storage::format_bytes(self.max_picture_bytes as u64)
            )));
        }

        let previous: Option<Option<String>> =
            sqlx::query_scalar("SELECT profile_picture_url FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        let Some(previous_url) = previous else {
            return Err(ServiceError::not_found("User not found for profile picture update."));
        };
        let previous_file = previous_url.as_deref().and_then(picture_filename_from_url);

        let filename = profile_picture_filename(user_id, extension);
        let url = format!("{}{}", PICTURE_URL_PREFIX, filename);
        self.pictures.put(&filename, &upload.bytes).await?;

        let updated = sqlx::query("UPDATE users SET profile_picture_url = $1 WHERE id = $2")
            .bind(&url)
            .bind(user_id)
            .execute(&self.pool)
            .await;

        let failure = match updated {
            Ok(result) if result.rows_affected() > 0 => None,
            Ok(_) => Some(ServiceError::not_found("User not found for profile picture update.")),
            Err(e) => Some(ServiceError::from(e)),
        };
        if let Some(err) = failure {
            // same name means the upload already overwrote the old picture
            if previous_file != Some(filename.as_str()) {
                if let Err(e) = self.pictures.remove(&filename).await {
                    tracing::warn!(user_id, "Could not remove new profile picture after failure: {}", e);
                }
            }
            return Err(err);
        }

        if let Some(old) = previous_file.filter(|old| *old != filename) {
            if let Err(e) = self.pictures.remove(old).await {
                tracing::warn!(user_id, "Failed to remove old profile picture {}: {}", old, e);
            }
        }

        tracing::info!(user_id, "Profile picture updated");
        Ok(url)
    }

    async fn find_by_id(&self, user_id: i64) -> ServiceResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn email_taken(&self, email: &str, except_user_id: Option<i64>) -> ServiceResult<bool> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(except_user_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn national_id_taken(&self, national_id: &str, except_user_id: Option<i64>) -> ServiceResult<bool> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE national_id_passport = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(national_id)
        .bind(except_user_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn insert_user(&self, new_user: NewUser) -> ServiceResult<User> {
        if self.email_taken(&new_user.email, None).await? {
            return Err(ServiceError::Conflict(ConflictKind::Email));
        }
        if let Some(national_id) = new_user.national_id_passport.as_deref() {
            if self.national_id_taken(national_id, None).await? {
                return Err(ServiceError::Conflict(ConflictKind::NationalId));
            }
        }

        let password_hash = hash_password(&new_user.password)?;
        let sql = format!(
            "INSERT INTO users (first_name, last_name, email, password_hash, gender, \
             national_id_passport, country, institution, official_work, role) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .bind(&new_user.email)
            .bind(&password_hash)
            .bind(&new_user.gender)
            .bind(&new_user.national_id_passport)
            .bind(&new_user.country)
            .bind(&new_user.institution)
            .bind(&new_user.official_work)
            .bind(new_user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(ServiceError::from_constraint)
    }

    async fn apply_changes(&self, user_id: i64, changes: UserChanges) -> ServiceResult<User> {
        if let Some(email) = changes.email.as_deref() {
            if self.email_taken(email, Some(user_id)).await? {
                return Err(ServiceError::Conflict(ConflictKind::Email));
            }
        }
        if let Some(Some(national_id)) = changes.national_id_passport.as_ref() {
            if self.national_id_taken(national_id, Some(user_id)).await? {
                return Err(ServiceError::Conflict(ConflictKind::NationalId));
            }
        }

        let mut update = UpdateBuilder::new("users");
        update
            .set_if("email", changes.email)
            .set_if("first_name", changes.first_name)
            .set_if("last_name", changes.last_name)
            .set_if("gender", changes.gender)
            .set_if("national_id_passport", changes.national_id_passport)
            .set_if("country", changes.country)
            .set_if("institution", changes.institution)
            .set_if("official_work", changes.official_work)
            .set_if("role", changes.role.map(|r| r.as_str()));
        if update.is_empty() {
            return Err(ServiceError::validation("No fields provided for update."));
        }

        let returning = format!("RETURNING {}", USER_COLUMNS);
        let mut query = update.finish("id", user_id, &returning);
        query
            .build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await
            .map_err(ServiceError::from_constraint)?
            .ok_or_else(|| ServiceError::not_found("User not found."))
    }

    fn session_for(&self, user: User) -> ServiceResult<AuthSession> {
        let token = self.tokens.issue_session(user.id, &user.email, user.role)?;
        Ok(AuthSession {
            token,
            expires_in: self.tokens.session_ttl().num_seconds(),
            user: user.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picture_extension_follows_content_type() {
        assert_eq!(picture_extension(Some("image/png")), Some("png"));
        assert_eq!(picture_extension(Some("image/jpeg")), Some("jpg"));
        assert_eq!(picture_extension(Some("image/gif")), Some("gif"));
        assert_eq!(picture_extension(Some("image/svg+xml")), None);
        assert_eq!(picture_extension(None), None);
    }

    #[test]
    fn picture_urls_map_back_to_file_names() {
        assert_eq!(picture_filename_from_url("/profile_pictures/profile_pic_3.png"), Some("profile_pic_3.png"));
        assert_eq!(picture_filename_from_url("/profile_pictures/"), None);
        assert_eq!(picture_filename_from_url("https://elsewhere/x.png"), None);
    }

    #[test]
    fn admin_patch_reads_profile_fields_alongside_role() {
        let patch: AdminUserPatch =
            serde_json::from_str(r#"{"role": "admin", "country": null, "first_name": "Ada"}"#).unwrap();
        assert_eq!(patch.role.as_deref(), Some("admin"));
        assert_eq!(patch.profile.first_name.as_deref(), Some("Ada"));
        assert_eq!(patch.profile.country, Some(None));
        assert_eq!(patch.profile.gender, None);
    }

    #[test]
    fn reset_request_accepts_camel_case_field() {
        let req: ResetPasswordRequest = serde_json::from_str(r#"{"newPassword": "s3cret"}"#).unwrap();
        assert_eq!(req.new_password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn invalid_role_is_a_validation_error() {
        assert!(matches!(parse_role("superuser"), Err(ServiceError::Validation { .. })));
        assert_eq!(parse_role("admin").unwrap(), Role::Admin);
    }
}
