use chrono::Utc;
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite};
use tracing::warn;

use crate::constants::ACTIVITY_PAGE_LIMIT;
use crate::db::Database;
use crate::error::AppResult;
use crate::models::{page_bounds, ActivityFilter, ActivityLog, ActivityPage, Pagination, ACTIVITY_COLUMNS};

/// Record an audit entry
pub async fn log_activity(
    db: &Database,
    action: &str,
    entity_type: &str,
    entity_id: &str,
    user_id: &str,
    metadata: Option<Value>,
) -> AppResult<()> {
    let metadata = metadata.map(|m| m.to_string());
    sqlx::query(
        "INSERT INTO activity_logs (id, action, entity_type, entity_id, user_id, metadata, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(user_id)
    .bind(metadata)
    .bind(Utc::now())
    .execute(db.pool())
    .await?;
    Ok(())
}

/// Record an audit entry after a mutation has already succeeded.
///
/// A failed audit write must not turn a completed change into an error response.
pub async fn log_activity_quietly(
    db: &Database,
    action: &str,
    entity_type: &str,
    entity_id: &str,
    user_id: &str,
    metadata: Option<Value>,
) {
    if let Err(e) = log_activity(db, action, entity_type, entity_id, user_id, metadata).await {
        warn!("[Activity] Failed to log {} {}/{}: {}", action, entity_type, entity_id, e);
    }
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a ActivityFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(entity_type) = filter.entity_type.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND l.entity_type = ").push_bind(entity_type);
    }
    if let Some(user_id) = filter.user_id.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND l.user_id = ").push_bind(user_id);
    }
}

/// Paginated audit trail, newest first
pub async fn list_activity(db: &Database, filter: &ActivityFilter) -> AppResult<ActivityPage> {
    let (page, limit, offset) = page_bounds(filter.page, filter.limit, ACTIVITY_PAGE_LIMIT);

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM activity_logs l");
    push_filters(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(db.pool()).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM activity_logs l LEFT JOIN users u ON u.id = l.user_id",
        ACTIVITY_COLUMNS
    ));
    push_filters(&mut qb, filter);
    qb.push(" ORDER BY l.created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let data = qb.build_query_as::<ActivityLog>().fetch_all(db.pool()).await?;

    Ok(ActivityPage {
        data,
        pagination: Pagination::new(total, page, limit),
    })
}

/// Most recent entries for the dashboard
pub async fn recent_activity(db: &Database, limit: i64) -> AppResult<Vec<ActivityLog>> {
    let rows = sqlx::query_as::<_, ActivityLog>(&format!(
        "SELECT {} FROM activity_logs l LEFT JOIN users u ON u.id = l.user_id \
         ORDER BY l.created_at DESC LIMIT ?",
        ACTIVITY_COLUMNS
    ))
    .bind(limit)
    .fetch_all(db.pool())
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{admin, seed_user};
    use serde_json::json;

    #[tokio::test]
    async fn logs_are_paginated_newest_first() {
        let db = Database::in_memory().await.unwrap();
        let user = admin(&db).await;

        for i in 0..12 {
            log_activity(&db, "created", "user", &format!("u{}", i), &user.id, None)
                .await
                .unwrap();
        }
        log_activity(&db, "generated", "report", "daily-report", &user.id, Some(json!({"emailsSent": 2})))
            .await
            .unwrap();

        let page = list_activity(&db, &ActivityFilter::default()).await.unwrap();
        assert_eq!(page.pagination.total, 13);
        assert_eq!(page.pagination.limit, 10);
        assert_eq!(page.pagination.total_pages, 2);
        assert_eq!(page.data.len(), 10);
        assert_eq!(page.data[0].entity_type, "report");
        assert_eq!(page.data[0].metadata.as_ref().unwrap()["emailsSent"], 2);
        assert_eq!(page.data[0].user.as_ref().unwrap().name, user.name);
    }

    #[tokio::test]
    async fn filters_by_entity_and_user() {
        let db = Database::in_memory().await.unwrap();
        let a = admin(&db).await;
        let b = seed_user(&db, "Bora", "bora@example.com").await;

        log_activity(&db, "created", "user", "x", &a.id, None).await.unwrap();
        log_activity(&db, "created", "report_schedule", "y", &b.id, None).await.unwrap();

        let filter = ActivityFilter {
            entity_type: Some("report_schedule".to_string()),
            ..Default::default()
        };
        let page = list_activity(&db, &filter).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.data[0].user_id, b.id);

        let filter = ActivityFilter {
            user_id: Some(a.id.clone()),
            ..Default::default()
        };
        assert_eq!(list_activity(&db, &filter).await.unwrap().data.len(), 1);
    }
}
