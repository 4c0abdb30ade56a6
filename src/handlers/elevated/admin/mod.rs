pub mod datasets; // /api/admin/datasets/*
pub mod users;    // /api/admin/users/*
