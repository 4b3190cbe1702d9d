//! Report schedules, manual runs and the cron endpoints
//!
//! `/api/cron/*` bypasses the session middleware and is guarded by the
//! `CRON_SECRET` bearer token instead.

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use crate::api::AppState;
use crate::commands::reports;
use crate::error::{AppError, AppResult};
use crate::models::{CreateScheduleRequest, ReportFrequency, ReportSchedule, SessionUser, UpdateScheduleRequest};
use crate::permissions::require_admin;
use crate::reports::{check_cron_secret, ManualRun, ScheduledRun};
use crate::scheduler::{self, SchedulerStatus};

// ========================
// Schedules
// ========================

pub async fn list_schedules(State(state): State<AppState>) -> AppResult<Json<Vec<ReportSchedule>>> {
    Ok(Json(reports::list_schedules(&state.db).await?))
}

pub async fn get_schedule(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<ReportSchedule>> {
    Ok(Json(reports::get_schedule(&state.db, &id).await?))
}

pub async fn create_schedule(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(req): Json<CreateScheduleRequest>,
) -> AppResult<(StatusCode, Json<ReportSchedule>)> {
    let schedule = reports::create_schedule(&state.db, &user, req).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn update_schedule(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateScheduleRequest>,
) -> AppResult<Json<ReportSchedule>> {
    Ok(Json(reports::update_schedule(&state.db, &user, &id, req).await?))
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    reports::delete_schedule(&state.db, &user, &id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn scheduler_status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(scheduler::status(&state.scheduler, &state.config.reports, Utc::now()).await)
}

fn parse_frequency(slug: &str) -> AppResult<ReportFrequency> {
    ReportFrequency::from_slug(slug)
        .ok_or_else(|| AppError::invalid_params(format!("Geçersiz rapor türü: {}", slug)))
}

/// Period-to-date run triggered from the dashboard
pub async fn run_report(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(frequency): Path<String>,
) -> AppResult<Json<ManualRun>> {
    require_admin(&user)?;
    let frequency = parse_frequency(&frequency)?;
    info!("[Reports] Manual {} run requested by {}", frequency.slug(), user.email);
    Ok(Json(state.reports.run_manual(frequency, Utc::now()).await?))
}

// ========================
// Cron
// ========================

fn authorize_cron(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    check_cron_secret(state.config.cron_secret.as_deref(), authorization)
}

pub async fn run_scheduled(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<ScheduledRun>> {
    authorize_cron(&state, &headers)?;
    Ok(Json(state.reports.run_scheduled(Utc::now()).await?))
}

/// `/api/cron/{daily|weekly|monthly}-report`
pub async fn cron_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(report): Path<String>,
) -> AppResult<Json<ManualRun>> {
    let frequency = report
        .strip_suffix("-report")
        .and_then(ReportFrequency::from_slug)
        .ok_or_else(|| AppError::not_found("Bulunamadı"))?;
    authorize_cron(&state, &headers)?;
    Ok(Json(state.reports.run_manual(frequency, Utc::now()).await?))
}
