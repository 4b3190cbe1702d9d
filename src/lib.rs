//! Alphacore business dashboard: HTTP API, persistence and scheduled reports

pub mod api;
pub mod commands;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod permissions;
pub mod reports;
pub mod scheduler;
pub mod validation;

pub use config::AppConfig;
pub use db::Database;
pub use error::{AppError, AppResult};
