// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no auth) → Protected (JWT auth) → Elevated (JWT auth + admin role)
pub mod elevated; // Tier 3: /api/admin/*
pub mod protected; // Tier 2: /api/* for any signed-in user
pub mod public; // Tier 1: signup, login, password reset
