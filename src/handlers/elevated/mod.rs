// handlers/elevated/mod.rs - Elevated handlers (admin role required)
//
// Security Level: JWT Authentication + role == admin
// Route Prefix: /api/admin/*
// Middleware: jwt_auth_middleware, then require_admin

pub mod admin;
