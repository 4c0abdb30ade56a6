pub mod access;
pub mod auth;
pub mod response;

pub use access::require_admin;
pub use auth::{jwt_auth_middleware, AuthFailure};
pub use response::{ApiResponse, ApiResult};
