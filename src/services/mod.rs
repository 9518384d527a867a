pub mod auth;
pub mod pdf;
pub mod permissions;
pub mod report_service;
