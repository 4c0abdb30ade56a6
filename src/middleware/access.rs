use axum::{extract::Request, middleware::Next, response::Response};

use crate::auth::{authorize_role, AuthUser};
use crate::error::ApiError;
use crate::types::Role;

/// Admin gate for the elevated routes. Runs after `jwt_auth_middleware`,
/// which places the `AuthUser` in the request extensions.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication token required", "NO_TOKEN"))?;

    if let Err(denied) = authorize_role(user, Role::Admin) {
        tracing::warn!(user_id = user.id, "Admin route refused: {}", request.uri().path());
        return Err(ApiError::forbidden(denied.to_string()));
    }

    Ok(next.run(request).await)
}
