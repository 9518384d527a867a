pub mod api;
pub mod app_state;
pub mod config;
pub mod database;
pub mod errors;
pub mod services;
pub mod views;

pub use app_state::AppState;
