//! Activity log and dashboard statistics

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;

use crate::api::AppState;
use crate::commands::{activity, dashboard};
use crate::commands::dashboard::DashboardStats;
use crate::error::AppResult;
use crate::models::{ActivityFilter, ActivityPage};

pub async fn list_activity(
    State(state): State<AppState>,
    Query(filter): Query<ActivityFilter>,
) -> AppResult<Json<ActivityPage>> {
    Ok(Json(activity::list_activity(&state.db, &filter).await?))
}

pub async fn dashboard_stats(State(state): State<AppState>) -> AppResult<Json<DashboardStats>> {
    let stats = dashboard::dashboard_stats(&state.db, Utc::now(), state.reports.offset()).await?;
    Ok(Json(stats))
}
