// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Security Level: JWT Authentication Required
// Middleware: jwt_auth_middleware places the caller's AuthUser in request extensions.
// Ownership checks happen in the services via authorize_owner_or_role.

pub mod dashboard; // /api/stats, /api/recent-files
pub mod datasets;  // /api/datasets/*, /api/user/datasets
pub mod profile;   // /api/profile/*
