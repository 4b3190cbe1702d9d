use chrono::{DateTime, Utc};
use serde_json::json;

use super::activity::log_activity_quietly;
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateScheduleRequest, ReportFrequency, ReportSchedule, SessionUser, UpdateScheduleRequest,
    SCHEDULE_COLUMNS, SCHEDULE_FROM,
};
use crate::validation;

const ENTITY_TYPE: &str = "report_schedule";
const MSG_SCHEDULE_NOT_FOUND: &str = "Rapor zamanlaması bulunamadı";

fn encode_recipients(recipients: &[String]) -> AppResult<String> {
    Ok(serde_json::to_string(recipients)?)
}

pub async fn list_schedules(db: &Database) -> AppResult<Vec<ReportSchedule>> {
    let schedules = sqlx::query_as::<_, ReportSchedule>(&format!(
        "SELECT {} {} ORDER BY s.created_at DESC",
        SCHEDULE_COLUMNS, SCHEDULE_FROM
    ))
    .fetch_all(db.pool())
    .await?;
    Ok(schedules)
}

pub async fn get_schedule(db: &Database, id: &str) -> AppResult<ReportSchedule> {
    sqlx::query_as::<_, ReportSchedule>(&format!("SELECT {} {} WHERE s.id = ?", SCHEDULE_COLUMNS, SCHEDULE_FROM))
        .bind(id)
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| AppError::not_found(MSG_SCHEDULE_NOT_FOUND))
}

/// Active schedules of one frequency, oldest first so the first owner is stable
pub async fn active_schedules(db: &Database, frequency: ReportFrequency) -> AppResult<Vec<ReportSchedule>> {
    let schedules = sqlx::query_as::<_, ReportSchedule>(&format!(
        "SELECT {} {} WHERE s.is_active = 1 AND s.frequency = ? ORDER BY s.created_at, s.rowid",
        SCHEDULE_COLUMNS, SCHEDULE_FROM
    ))
    .bind(frequency)
    .fetch_all(db.pool())
    .await?;
    Ok(schedules)
}

pub async fn mark_run(db: &Database, id: &str, at: DateTime<Utc>) -> AppResult<()> {
    sqlx::query("UPDATE report_schedules SET last_run_at = ? WHERE id = ?")
        .bind(at)
        .bind(id)
        .execute(db.pool())
        .await?;
    Ok(())
}

pub async fn create_schedule(
    db: &Database,
    user: &SessionUser,
    req: CreateScheduleRequest,
) -> AppResult<ReportSchedule> {
    validation::validate_schedule(&req)?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO report_schedules (id, name, frequency, recipients, is_active, user_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(req.name.trim())
    .bind(req.frequency)
    .bind(encode_recipients(&req.recipients)?)
    .bind(req.is_active.unwrap_or(true))
    .bind(&user.id)
    .bind(now)
    .bind(now)
    .execute(db.pool())
    .await?;

    let schedule = get_schedule(db, &id).await?;
    log_activity_quietly(
        db,
        "created",
        ENTITY_TYPE,
        &schedule.id,
        &user.id,
        Some(json!({ "scheduleName": schedule.name, "frequency": schedule.frequency })),
    )
    .await;
    Ok(schedule)
}

/// Apply only the fields present in `req`
pub async fn update_schedule(
    db: &Database,
    user: &SessionUser,
    id: &str,
    req: UpdateScheduleRequest,
) -> AppResult<ReportSchedule> {
    let existing = get_schedule(db, id).await?;
    validation::validate_schedule_update(&req)?;

    let recipients = req.recipients.as_deref().unwrap_or(&existing.recipients);
    sqlx::query(
        "UPDATE report_schedules SET name = ?, frequency = ?, recipients = ?, is_active = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(req.name.as_deref().map(str::trim).unwrap_or(&existing.name))
    .bind(req.frequency.unwrap_or(existing.frequency))
    .bind(encode_recipients(recipients)?)
    .bind(req.is_active.unwrap_or(existing.is_active))
    .bind(Utc::now())
    .bind(id)
    .execute(db.pool())
    .await?;

    let schedule = get_schedule(db, id).await?;
    log_activity_quietly(
        db,
        "updated",
        ENTITY_TYPE,
        &schedule.id,
        &user.id,
        Some(json!({
            "scheduleName": schedule.name,
            "frequency": schedule.frequency,
            "isActive": schedule.is_active,
        })),
    )
    .await;
    Ok(schedule)
}

pub async fn delete_schedule(db: &Database, user: &SessionUser, id: &str) -> AppResult<()> {
    let schedule = get_schedule(db, id).await?;
    sqlx::query("DELETE FROM report_schedules WHERE id = ?")
        .bind(id)
        .execute(db.pool())
        .await?;

    log_activity_quietly(
        db,
        "deleted",
        ENTITY_TYPE,
        id,
        &user.id,
        Some(json!({ "scheduleName": schedule.name, "frequency": schedule.frequency })),
    )
    .await;
    Ok(())
}
