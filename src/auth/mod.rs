pub mod access;
pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::types::Role;

pub use access::{authorize_owner_or_role, authorize_role, AuthUser, Forbidden};
pub use password::{hash_password, verify_password, CredentialError};

const SESSION_PURPOSE: &str = "session";
const RESET_PURPOSE: &str = "password_reset";

/// Claims embedded in a login/signup session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub role: Role,
    pub purpose: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims embedded in a short-lived password reset token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub sub: i64,
    pub purpose: String,
    pub iat: i64,
    pub exp: i64,
}

/// Why a presented token was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token invalid")]
    Invalid,
}

#[derive(Debug, Error)]
#[error("JWT generation error: {0}")]
pub struct TokenIssueError(#[from] jsonwebtoken::errors::Error);

/// Issues and verifies signed session and reset tokens with a server-held secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_ttl: Duration,
    reset_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, session_ttl: Duration, reset_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            session_ttl,
            reset_ttl,
        }
    }

    pub fn from_config(security: &SecurityConfig) -> Self {
        Self::new(
            &security.jwt_secret,
            Duration::minutes(security.session_ttl_minutes),
            Duration::minutes(security.reset_ttl_minutes),
        )
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub fn reset_ttl(&self) -> Duration {
        self.reset_ttl
    }

    pub fn issue_session(&self, user_id: i64, email: &str, role: Role) -> Result<String, TokenIssueError> {
        self.issue_session_with_ttl(user_id, email, role, self.session_ttl)
    }

    pub fn issue_session_with_ttl(
        &self,
        user_id: i64,
        email: &str,
        role: Role,
        ttl: Duration,
    ) -> Result<String, TokenIssueError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            purpose: SESSION_PURPOSE.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    pub fn verify_session(&self, token: &str) -> Result<Claims, TokenError> {
        let claims: Claims = self.decode(token)?;
        if claims.purpose != SESSION_PURPOSE {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }

    pub fn issue_reset(&self, user_id: i64) -> Result<String, TokenIssueError> {
        self.issue_reset_with_ttl(user_id, self.reset_ttl)
    }

    pub fn issue_reset_with_ttl(&self, user_id: i64, ttl: Duration) -> Result<String, TokenIssueError> {
        let now = Utc::now();
        let claims = ResetClaims {
            sub: user_id,
            purpose: RESET_PURPOSE.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    pub fn verify_reset(&self, token: &str) -> Result<ResetClaims, TokenError> {
        let claims: ResetClaims = self.decode(token)?;
        if claims.purpose != RESET_PURPOSE {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("unit-test-secret", Duration::hours(1), Duration::minutes(15))
    }

    #[test]
    fn session_token_round_trips_claims() {
        let tokens = service();
        let token = tokens.issue_session(42, "ada@example.com", Role::Admin).unwrap();
        let claims = tokens.verify_session(&token).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn expired_and_invalid_are_distinguished() {
        let tokens = service();
        let expired = tokens
            .issue_session_with_ttl(1, "a@b.c", Role::User, Duration::minutes(-5))
            .unwrap();
        assert_eq!(tokens.verify_session(&expired).unwrap_err(), TokenError::Expired);
        assert_eq!(tokens.verify_session("not.a.token").unwrap_err(), TokenError::Invalid);

        let other = TokenService::new("other-secret", Duration::hours(1), Duration::minutes(15));
        let foreign = other.issue_session(1, "a@b.c", Role::User).unwrap();
        assert_eq!(tokens.verify_session(&foreign).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn reset_and_session_tokens_are_not_interchangeable() {
        let tokens = service();
        let reset = tokens.issue_reset(7).unwrap();
        let session = tokens.issue_session(7, "x@y.z", Role::User).unwrap();

        assert_eq!(tokens.verify_reset(&reset).unwrap().sub, 7);
        assert_eq!(tokens.verify_session(&reset).unwrap_err(), TokenError::Invalid);
        assert_eq!(tokens.verify_reset(&session).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn reset_token_defaults_to_fifteen_minutes() {
        let tokens = service();
        let claims = tokens.verify_reset(&tokens.issue_reset(3).unwrap()).unwrap();
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }
}
