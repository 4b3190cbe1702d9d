//! HTTP request handlers
//!
//! Handlers stay thin: pull the session user and inputs out of the request,
//! call into `commands`, and let `AppError` pick the status code.

pub mod activity;
pub mod finance;
pub mod projects;
pub mod reports;
pub mod tasks;
pub mod users;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;
use tracing::error;

use super::AppState;
use crate::commands::users::count_users;

/// Health check endpoint (public)
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match count_users(&state.db).await {
        Ok(user_count) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "database": "connected",
                "userCount": user_count,
                "timestamp": Utc::now(),
            })),
        ),
        Err(e) => {
            error!("[API] Health check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "database": "failed",
                    "error": e.to_string(),
                    "timestamp": Utc::now(),
                })),
            )
        }
    }
}
