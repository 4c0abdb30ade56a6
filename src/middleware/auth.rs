use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::{AuthUser, TokenError};
use crate::error::ApiError;
use crate::state::AppState;

/// Why a request was not authenticated. All three deny with 401; the code
/// tells the client which one applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    NoToken,
    Invalid,
    Expired,
}

impl AuthFailure {
    pub fn code(self) -> &'static str {
        match self {
            AuthFailure::NoToken => "NO_TOKEN",
            AuthFailure::Invalid => "TOKEN_INVALID",
            AuthFailure::Expired => "TOKEN_EXPIRED",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            AuthFailure::NoToken => "Authentication token required",
            AuthFailure::Invalid => "Invalid authentication token",
            AuthFailure::Expired => "Authentication token has expired",
        }
    }
}

impl From<TokenError> for AuthFailure {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthFailure::Expired,
            TokenError::Invalid => AuthFailure::Invalid,
        }
    }
}

impl From<AuthFailure> for ApiError {
    fn from(failure: AuthFailure) -> Self {
        ApiError::unauthorized(failure.message(), failure.code())
    }
}

/// JWT authentication middleware that validates tokens and extracts user context
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = authenticate(&state, request.headers()).map_err(|failure| {
        tracing::debug!("Rejected request to {}: {:?}", request.uri().path(), failure);
        ApiError::from(failure)
    })?;

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Resolve the caller from the `Authorization: Bearer` header. Only the token
/// signature and expiry are checked; the role comes from the claims.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AuthFailure> {
    let token = extract_jwt_from_headers(headers).ok_or(AuthFailure::NoToken)?;
    let claims = state.tokens.verify_session(token)?;
    Ok(AuthUser::from(claims))
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Option<&str> {
    let auth_str = headers.get(AUTHORIZATION)?.to_str().ok()?;
    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
