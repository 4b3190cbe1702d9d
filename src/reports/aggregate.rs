//! Report data collected from the store for one window

use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;
use sqlx::Row;
use std::collections::HashMap;
use ts_rs::TS;

use super::period::ReportWindow;
use crate::constants::TOP_CATEGORY_COUNT;
use crate::db::Database;
use crate::error::AppResult;
use crate::models::{ReportFrequency, Transaction, TransactionType, TRANSACTION_COLUMNS, TRANSACTION_FROM};

#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, TS)]
#[ts(export, export_to = "models/")]
pub struct FinancialSummary {
    pub income: f64,
    pub expense: f64,
    pub net: f64,
}

impl FinancialSummary {
    pub fn from_amounts(amounts: impl IntoIterator<Item = (TransactionType, f64)>) -> Self {
        let (income, expense) = amounts
            .into_iter()
            .fold((0.0, 0.0), |(income, expense), (kind, amount)| match kind {
                TransactionType::Income => (income + amount, expense),
                TransactionType::Expense => (income, expense + amount),
            });
        Self {
            income,
            expense,
            net: income - expense,
        }
    }

    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        Self::from_amounts(transactions.iter().map(|t| (t.kind, t.amount)))
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct TaskStatistics {
    pub completed: i64,
    pub in_progress: i64,
    pub total: i64,
}

impl TaskStatistics {
    pub fn pending(&self) -> i64 {
        self.total - self.completed - self.in_progress
    }

    /// Whole-percent completion rate, `None` without tasks
    pub fn completion_rate(&self) -> Option<i64> {
        (self.total > 0).then(|| ((self.completed as f64 / self.total as f64) * 100.0).round() as i64)
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, TS)]
#[ts(export, export_to = "models/")]
pub struct CategorySpend {
    pub name: String,
    pub amount: f64,
}

#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct DailyReport {
    pub date: NaiveDate,
    pub window: ReportWindow,
    pub summary: FinancialSummary,
    pub transactions: Vec<Transaction>,
    pub completed_tasks_count: i64,
}

/// Weekly and monthly reports share one shape; the comparison fields are
/// only filled for monthly runs.
#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct PeriodReport {
    pub window: ReportWindow,
    pub financial_summary: FinancialSummary,
    pub task_statistics: TaskStatistics,
    pub top_categories: Vec<CategorySpend>,
    pub transactions_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_window: Option<ReportWindow>,
    pub previous_month_net: Option<f64>,
    pub change_percent: Option<f64>,
}

#[derive(Clone, Debug, Serialize, TS)]
#[serde(untagged)]
#[ts(export, export_to = "models/")]
pub enum ReportData {
    Daily(DailyReport),
    Period(PeriodReport),
}

impl ReportData {
    pub fn window(&self) -> &ReportWindow {
        match self {
            ReportData::Daily(report) => &report.window,
            ReportData::Period(report) => &report.window,
        }
    }

    pub fn transactions_count(&self) -> usize {
        match self {
            ReportData::Daily(report) => report.transactions.len(),
            ReportData::Period(report) => report.transactions_count,
        }
    }
}

/// Expense totals per category name, largest first (ties by name), at most `limit`
pub fn top_categories(transactions: &[Transaction], limit: usize) -> Vec<CategorySpend> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for t in transactions.iter().filter(|t| t.kind == TransactionType::Expense) {
        *totals.entry(t.category.name.as_str()).or_insert(0.0) += t.amount;
    }

    let mut ranked: Vec<CategorySpend> = totals
        .into_iter()
        .map(|(name, amount)| CategorySpend {
            name: name.to_string(),
            amount,
        })
        .collect();
    ranked.sort_by(|a, b| b.amount.total_cmp(&a.amount).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(limit);
    ranked
}

/// Net change against the previous period, relative to its magnitude
pub fn change_percent(net: f64, previous: Option<f64>) -> Option<f64> {
    previous
        .filter(|prev| *prev != 0.0)
        .map(|prev| (net - prev) / prev.abs() * 100.0)
}

// ========================
// Store queries
// ========================

/// Transactions dated inside the window, newest first
pub async fn transactions_in(db: &Database, window: &ReportWindow) -> AppResult<Vec<Transaction>> {
    let rows = sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {} {} WHERE t.date >= ? AND t.date < ? ORDER BY t.date DESC",
        TRANSACTION_COLUMNS, TRANSACTION_FROM
    ))
    .bind(window.start)
    .bind(window.end)
    .fetch_all(db.pool())
    .await?;
    Ok(rows)
}

/// Tasks marked done whose last update falls inside the window
pub async fn completed_tasks_in(db: &Database, window: &ReportWindow) -> AppResult<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE status = 'DONE' AND updated_at >= ? AND updated_at < ?")
        .bind(window.start)
        .bind(window.end)
        .fetch_one(db.pool())
        .await?;
    Ok(count)
}

/// Statistics over tasks created inside the window
pub async fn task_statistics(db: &Database, window: &ReportWindow) -> AppResult<TaskStatistics> {
    let row = sqlx::query(
        "SELECT \
           COUNT(CASE WHEN status = 'DONE' THEN 1 END) AS completed, \
           COUNT(CASE WHEN status = 'IN_PROGRESS' THEN 1 END) AS in_progress, \
           COUNT(*) AS total \
         FROM tasks WHERE created_at >= ? AND created_at < ?",
    )
    .bind(window.start)
    .bind(window.end)
    .fetch_one(db.pool())
    .await?;
    Ok(TaskStatistics {
        completed: row.try_get("completed")?,
        in_progress: row.try_get("in_progress")?,
        total: row.try_get("total")?,
    })
}

/// Net of the window, `None` when it holds no transactions at all
pub async fn net_of(db: &Database, window: &ReportWindow) -> AppResult<Option<f64>> {
    let rows = sqlx::query("SELECT type, amount FROM transactions WHERE date >= ? AND date < ?")
        .bind(window.start)
        .bind(window.end)
        .fetch_all(db.pool())
        .await?;
    if rows.is_empty() {
        return Ok(None);
    }
    let amounts = rows
        .iter()
        .map(|row| Ok((row.try_get("type")?, row.try_get("amount")?)))
        .collect::<Result<Vec<(TransactionType, f64)>, sqlx::Error>>()?;
    Ok(Some(FinancialSummary::from_amounts(amounts).net))
}

/// Collect the data for one report over `window`
pub async fn build_report(
    db: &Database,
    frequency: ReportFrequency,
    window: ReportWindow,
    offset: FixedOffset,
) -> AppResult<ReportData> {
    let transactions = transactions_in(db, &window).await?;
    let summary = FinancialSummary::from_transactions(&transactions);

    if frequency == ReportFrequency::Daily {
        return Ok(ReportData::Daily(DailyReport {
            date: window.first_day,
            window,
            summary,
            completed_tasks_count: completed_tasks_in(db, &window).await?,
            transactions,
        }));
    }

    let (previous_window, previous_month_net) = if frequency == ReportFrequency::Monthly {
        let previous = window.previous_month(offset);
        (Some(previous), net_of(db, &previous).await?)
    } else {
        (None, None)
    };

    Ok(ReportData::Period(PeriodReport {
        window,
        task_statistics: task_statistics(db, &window).await?,
        top_categories: top_categories(&transactions, TOP_CATEGORY_COUNT),
        transactions_count: transactions.len(),
        change_percent: change_percent(summary.net, previous_month_net),
        financial_summary: summary,
        previous_window,
        previous_month_net,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::projects::create_project;
    use crate::commands::tasks::{create_task, delete_task, reorder_task, update_task};
    use crate::commands::testing::admin;
    use crate::models::{
        CategoryRef, CreateTaskRequest, ProjectInput, ReorderRequest, TaskStatus, UpdateTaskRequest,
    };
    use chrono::{Duration, TimeZone, Utc};

    fn tx(kind: TransactionType, category: &str, amount: f64) -> Transaction {
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            amount,
            description: String::new(),
            date: Utc::now(),
            category_id: category.to_string(),
            user_id: "u".to_string(),
            category: CategoryRef {
                id: category.to_string(),
                name: category.to_string(),
                color: "#000000".to_string(),
                icon: None,
            },
            user: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn summary_nets_income_and_expense() {
        let txs = vec![
            tx(TransactionType::Income, "Satış", 1000.0),
            tx(TransactionType::Expense, "Kira", 300.0),
            tx(TransactionType::Expense, "Fatura", 50.0),
        ];
        let summary = FinancialSummary::from_transactions(&txs);
        assert_eq!(summary.income, 1000.0);
        assert_eq!(summary.expense, 350.0);
        assert_eq!(summary.net, 650.0);
    }

    #[test]
    fn top_categories_rank_expenses_only() {
        let txs = vec![
            tx(TransactionType::Expense, "Kira", 300.0),
            tx(TransactionType::Expense, "Maaş", 500.0),
            tx(TransactionType::Expense, "Kira", 300.0),
            tx(TransactionType::Income, "Satış", 9999.0),
            tx(TransactionType::Expense, "Ulaşım", 20.0),
            tx(TransactionType::Expense, "Fatura", 20.0),
            tx(TransactionType::Expense, "Yemek", 10.0),
            tx(TransactionType::Expense, "Ofis", 5.0),
        ];
        let top = top_categories(&txs, 5);
        let names: Vec<&str> = top.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Kira", "Maaş", "Fatura", "Ulaşım", "Yemek"]);
        assert_eq!(top[0].amount, 600.0);
    }

    #[test]
    fn change_percent_needs_nonzero_previous() {
        assert_eq!(change_percent(150.0, Some(100.0)), Some(50.0));
        assert_eq!(change_percent(-50.0, Some(-100.0)), Some(50.0));
        assert_eq!(change_percent(100.0, Some(0.0)), None);
        assert_eq!(change_percent(100.0, None), None);
    }

    #[test]
    fn task_statistics_helpers() {
        let stats = TaskStatistics {
            completed: 1,
            in_progress: 1,
            total: 3,
        };
        assert_eq!(stats.pending(), 1);
        assert_eq!(stats.completion_rate(), Some(33));
        assert_eq!(TaskStatistics::default().completion_rate(), None);
    }

    fn task(project_id: &str, title: &str, status: TaskStatus) -> CreateTaskRequest {
        CreateTaskRequest {
            title: title.to_string(),
            description: None,
            status: Some(status),
            priority: None,
            due_date: None,
            project_id: project_id.to_string(),
            assignee_id: None,
            label_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn completed_today_counts_only_tasks_moved_to_done() {
        let db = Database::in_memory().await.unwrap();
        let owner = admin(&db).await;
        let project_id = create_project(
            &db,
            &owner,
            ProjectInput {
                name: "Pano".to_string(),
                description: None,
                status: None,
                color: "#3b82f6".to_string(),
                budget: None,
                start_date: None,
                end_date: None,
            },
        )
        .await
        .unwrap()
        .project
        .id;

        let mut done = Vec::new();
        for title in ["Eski 1", "Eski 2", "Eski 3"] {
            done.push(create_task(&db, &owner, task(&project_id, title, TaskStatus::Done)).await.unwrap());
        }
        let fresh = create_task(&db, &owner, task(&project_id, "Yeni", TaskStatus::Todo)).await.unwrap();
        let ongoing = create_task(&db, &owner, task(&project_id, "Süren", TaskStatus::InProgress))
            .await
            .unwrap();

        // Everything was last touched long before today
        sqlx::query("UPDATE tasks SET updated_at = ?")
            .bind(Utc.with_ymd_and_hms(2020, 1, 1, 9, 0, 0).unwrap())
            .execute(db.pool())
            .await
            .unwrap();

        let offset = FixedOffset::east_opt(0).unwrap();
        let today = Utc::now().date_naive();
        let window = ReportWindow::days(today, today + Duration::days(1), offset);
        assert_eq!(completed_tasks_in(&db, &window).await.unwrap(), 0);

        // A non-DONE task edited today does not count
        update_task(
            &db,
            &owner,
            &ongoing.id,
            UpdateTaskRequest {
                title: Some("Süren iş".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(completed_tasks_in(&db, &window).await.unwrap(), 0);

        // Moving into the top of the DONE column shifts the old DONE tasks
        // without counting them
        reorder_task(
            &db,
            &owner,
            ReorderRequest {
                task_id: fresh.id.clone(),
                status: TaskStatus::Done,
                order: 0,
            },
        )
        .await
        .unwrap();
        assert_eq!(completed_tasks_in(&db, &window).await.unwrap(), 1);

        delete_task(&db, &owner, &done[0].id).await.unwrap();
        assert_eq!(completed_tasks_in(&db, &window).await.unwrap(), 1);

        let ReportData::Daily(report) = build_report(&db, ReportFrequency::Daily, window, offset).await.unwrap() else {
            panic!("daily run must produce a daily report");
        };
        assert_eq!(report.completed_tasks_count, 1);
    }
}
