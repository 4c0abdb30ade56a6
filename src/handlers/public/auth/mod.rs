// handlers/public/auth/mod.rs - Public authentication handlers
//
// Token acquisition endpoints that do not require authentication.

pub mod login;    // POST /api/login - authenticate and get JWT
pub mod password; // POST /api/forgot-password, /api/reset-password/:token
pub mod register; // POST /api/signup - create new account

pub use login::login_post;
pub use password::{forgot_password_post, reset_password_post};
pub use register::register_post;
