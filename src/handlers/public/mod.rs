// handlers/public/mod.rs - Public handlers (no authentication)
//
// Security Level: none
// Routes: /api/signup, /api/login, /api/forgot-password, /api/reset-password/:token

pub mod auth;
