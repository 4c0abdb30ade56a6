//! Authorization checks. Pure functions of the identity carried by the session
//! token and the resource owner; nothing here touches the database.

use std::fmt;

use super::Claims;
use crate::types::Role;

/// Authenticated caller, derived from verified session claims.
/// The role is trusted from the token and not re-read from the users table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Reason an authenticated caller is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forbidden {
    RoleRequired(Role),
    NotOwner,
    PrivateDataset,
    ApprovedDatasetLocked,
    SelfDemotion,
    SelfDelete,
}

impl fmt::Display for Forbidden {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Forbidden::RoleRequired(Role::Admin) => f.write_str("Access denied. Administrator privileges required."),
            Forbidden::RoleRequired(role) => write!(f, "Access denied. Role '{}' required.", role),
            Forbidden::NotOwner => {
                f.write_str("Access denied: you can only modify your own datasets or have admin privileges.")
            }
            Forbidden::PrivateDataset => f.write_str("Access denied: this dataset is private."),
            Forbidden::ApprovedDatasetLocked => {
                f.write_str("Approved datasets can only be edited by an administrator.")
            }
            Forbidden::SelfDemotion => f.write_str("An admin cannot demote themselves."),
            Forbidden::SelfDelete => f.write_str("You cannot delete your own user account."),
        }
    }
}

impl std::error::Error for Forbidden {}

/// Pass only if the caller holds exactly `required`
pub fn authorize_role(user: &AuthUser, required: Role) -> Result<(), Forbidden> {
    if user.role == required {
        Ok(())
    } else {
        Err(Forbidden::RoleRequired(required))
    }
}

/// Pass if the caller owns the resource or holds `required`
pub fn authorize_owner_or_role(user: &AuthUser, resource_owner_id: i64, required: Role) -> Result<(), Forbidden> {
    if user.id == resource_owner_id || user.role == required {
        Ok(())
    } else {
        Err(Forbidden::NotOwner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: Role) -> AuthUser {
        AuthUser { id, email: format!("u{id}@example.com"), role }
    }

    #[test]
    fn role_check_is_strict_equality() {
        assert!(authorize_role(&user(1, Role::Admin), Role::Admin).is_ok());
        assert_eq!(
            authorize_role(&user(1, Role::User), Role::Admin),
            Err(Forbidden::RoleRequired(Role::Admin))
        );
    }

    #[test]
    fn owner_or_role_accepts_either() {
        assert!(authorize_owner_or_role(&user(7, Role::User), 7, Role::Admin).is_ok());
        assert!(authorize_owner_or_role(&user(1, Role::Admin), 7, Role::Admin).is_ok());
        assert_eq!(
            authorize_owner_or_role(&user(2, Role::User), 7, Role::Admin),
            Err(Forbidden::NotOwner)
        );
    }

    #[test]
    fn identity_comes_from_claims() {
        let claims = Claims {
            sub: 9,
            email: "nine@example.com".to_string(),
            role: Role::User,
            purpose: "session".to_string(),
            iat: 0,
            exp: 1,
        };
        let identity = AuthUser::from(claims);
        assert_eq!(identity.id, 9);
        assert!(!identity.is_admin());
    }
}
