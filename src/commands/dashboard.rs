use chrono::{DateTime, Datelike, FixedOffset, Utc};
use serde::Serialize;
use sqlx::Row;
use std::collections::BTreeMap;
use ts_rs::TS;

use super::activity::recent_activity;
use crate::constants::{DASHBOARD_MONTHS, DASHBOARD_RECENT_ACTIVITY, DASHBOARD_UPCOMING_TASKS};
use crate::db::Database;
use crate::error::AppResult;
use crate::models::{TaskPriority, TaskStatus, TransactionType};
use crate::reports::period::{local_month_start, shift_month};

#[derive(Clone, Debug, Serialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct MonthlyTotals {
    /// `YYYY-MM`
    pub month: String,
    pub income: f64,
    pub expense: f64,
}

#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct UpcomingTask {
    pub id: String,
    pub title: String,
    pub due_date: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_name: Option<String>,
    pub project_name: String,
}

#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct RecentActivity {
    pub id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub created_at: DateTime<Utc>,
    pub user_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct DashboardStats {
    pub total_income: f64,
    pub total_expense: f64,
    pub net_profit: f64,
    pub active_task_count: i64,
    pub monthly_data: Vec<MonthlyTotals>,
    pub upcoming_tasks: Vec<UpcomingTask>,
    pub recent_activities: Vec<RecentActivity>,
}

/// Zero-filled income/expense series for the `DASHBOARD_MONTHS` months ending at `now`
fn monthly_series(
    now: DateTime<Utc>,
    offset: FixedOffset,
    rows: &[(TransactionType, f64, DateTime<Utc>)],
) -> Vec<MonthlyTotals> {
    let local = now.with_timezone(&offset);
    let mut buckets: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for back in (0..DASHBOARD_MONTHS as i32).rev() {
        let (year, month) = shift_month(local.year(), local.month(), -back);
        buckets.insert(format!("{:04}-{:02}", year, month), (0.0, 0.0));
    }

    for (kind, amount, date) in rows {
        let key = date.with_timezone(&offset).format("%Y-%m").to_string();
        if let Some(bucket) = buckets.get_mut(&key) {
            match kind {
                TransactionType::Income => bucket.0 += amount,
                TransactionType::Expense => bucket.1 += amount,
            }
        }
    }

    buckets
        .into_iter()
        .map(|(month, (income, expense))| MonthlyTotals { month, income, expense })
        .collect()
}

pub async fn dashboard_stats(db: &Database, now: DateTime<Utc>, offset: FixedOffset) -> AppResult<DashboardStats> {
    let totals = sqlx::query(
        "SELECT \
           COALESCE(SUM(CASE WHEN type = 'INCOME' THEN amount END), 0.0) AS income, \
           COALESCE(SUM(CASE WHEN type = 'EXPENSE' THEN amount END), 0.0) AS expense \
         FROM transactions",
    )
    .fetch_one(db.pool())
    .await?;
    let total_income: f64 = totals.try_get("income")?;
    let total_expense: f64 = totals.try_get("expense")?;

    let active_task_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE status != 'DONE'")
        .fetch_one(db.pool())
        .await?;

    let local = now.with_timezone(&offset);
    let (year, month) = shift_month(local.year(), local.month(), -(DASHBOARD_MONTHS as i32 - 1));
    let since = local_month_start(year, month, offset);
    let rows = sqlx::query("SELECT type, amount, date FROM transactions WHERE date >= ?")
        .bind(since)
        .fetch_all(db.pool())
        .await?
        .iter()
        .map(|row| Ok((row.try_get("type")?, row.try_get("amount")?, row.try_get("date")?)))
        .collect::<Result<Vec<_>, sqlx::Error>>()?;
    let monthly_data = monthly_series(now, offset, &rows);

    let upcoming_tasks = sqlx::query(
        "SELECT t.id, t.title, t.due_date, t.status, t.priority, a.name AS assignee_name, p.name AS project_name \
         FROM tasks t JOIN projects p ON p.id = t.project_id LEFT JOIN users a ON a.id = t.assignee_id \
         WHERE t.status != 'DONE' AND t.due_date IS NOT NULL \
         ORDER BY t.due_date LIMIT ?",
    )
    .bind(DASHBOARD_UPCOMING_TASKS)
    .fetch_all(db.pool())
    .await?
    .iter()
    .map(|row| {
        Ok(UpcomingTask {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            due_date: row.try_get("due_date")?,
            status: row.try_get("status")?,
            priority: row.try_get("priority")?,
            assignee_name: row.try_get("assignee_name")?,
            project_name: row.try_get("project_name")?,
        })
    })
    .collect::<Result<Vec<_>, sqlx::Error>>()?;

    let recent_activities = recent_activity(db, DASHBOARD_RECENT_ACTIVITY)
        .await?
        .into_iter()
        .map(|log| RecentActivity {
            id: log.id,
            action: log.action,
            entity_type: log.entity_type,
            entity_id: log.entity_id,
            created_at: log.created_at,
            user_name: log.user.map(|u| u.name),
        })
        .collect();

    Ok(DashboardStats {
        total_income,
        total_expense,
        net_profit: total_income - total_expense,
        active_task_count,
        monthly_data,
        upcoming_tasks,
        recent_activities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn istanbul() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    #[test]
    fn series_spans_twelve_months_zero_filled() {
        let now = Utc.with_ymd_and_hms(2025, 3, 15, 9, 0, 0).unwrap();
        let series = monthly_series(now, istanbul(), &[]);
        assert_eq!(series.len(), 12);
        assert_eq!(series[0].month, "2024-04");
        assert_eq!(series[11].month, "2025-03");
        assert!(series.iter().all(|m| m.income == 0.0 && m.expense == 0.0));
    }

    #[test]
    fn series_buckets_by_local_month() {
        let now = Utc.with_ymd_and_hms(2025, 3, 15, 9, 0, 0).unwrap();
        let rows = vec![
            // 22:30 UTC on Feb 28 is already March 1st in UTC+3
            (TransactionType::Income, 100.0, Utc.with_ymd_and_hms(2025, 2, 28, 22, 30, 0).unwrap()),
            (TransactionType::Expense, 40.0, Utc.with_ymd_and_hms(2025, 2, 10, 12, 0, 0).unwrap()),
            // Outside the window
            (TransactionType::Income, 5.0, Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap()),
        ];
        let series = monthly_series(now, istanbul(), &rows);
        let march = series.iter().find(|m| m.month == "2025-03").unwrap();
        let feb = series.iter().find(|m| m.month == "2025-02").unwrap();
        assert_eq!(march.income, 100.0);
        assert_eq!(feb.expense, 40.0);
        assert_eq!(series.iter().map(|m| m.income).sum::<f64>(), 100.0);
    }

    #[tokio::test]
    async fn empty_database_stats() {
        let db = Database::in_memory().await.unwrap();
        let stats = dashboard_stats(&db, Utc::now(), istanbul()).await.unwrap();
        assert_eq!(stats.total_income, 0.0);
        assert_eq!(stats.net_profit, 0.0);
        assert_eq!(stats.active_task_count, 0);
        assert_eq!(stats.monthly_data.len(), 12);
        assert!(stats.upcoming_tasks.is_empty());
    }
}
