//! Demo data for a fresh installation

use chrono::{Duration, Utc};
use tracing::info;

use super::{categories, members, projects, tasks, transactions, users};
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{
    AddMemberRequest, CategoryInput, CreateTaskRequest, MemberRole, ProjectInput, ProjectStatus,
    SessionUser, TaskPriority, TaskStatus, TransactionInput, TransactionType, UserRole,
};

pub const SEED_PASSWORD: &str = "admin123";

const SEED_USERS: [(&str, &str); 2] = [
    ("Muhammet İkbal Köç", "ikbal80koc@gmail.com"),
    ("Abdulmelik Eymen Alpat", "eymenalpat0@gmail.com"),
];

const CATEGORIES: [(&str, TransactionType, &str, &str); 10] = [
    ("Müşteri Ödemesi", TransactionType::Income, "#22c55e", "banknote"),
    ("Danışmanlık", TransactionType::Income, "#3b82f6", "briefcase"),
    ("Abonelik Geliri", TransactionType::Income, "#8b5cf6", "repeat"),
    ("Diğer Gelir", TransactionType::Income, "#06b6d4", "plus-circle"),
    ("Kira", TransactionType::Expense, "#ef4444", "home"),
    ("Maaş", TransactionType::Expense, "#f97316", "users"),
    ("Yazılım Lisansları", TransactionType::Expense, "#eab308", "code"),
    ("Ofis Giderleri", TransactionType::Expense, "#ec4899", "building"),
    ("Pazarlama", TransactionType::Expense, "#14b8a6", "megaphone"),
    ("Diğer Gider", TransactionType::Expense, "#6b7280", "minus-circle"),
];

const LABELS: [(&str, &str); 6] = [
    ("Acil", "#ef4444"),
    ("Hata", "#f97316"),
    ("Geliştirme", "#3b82f6"),
    ("Tasarım", "#8b5cf6"),
    ("Dokümantasyon", "#06b6d4"),
    ("İyileştirme", "#22c55e"),
];

const TASKS: [(&str, TaskStatus, TaskPriority); 5] = [
    ("Tasarım prototipi hazırla", TaskStatus::Done, TaskPriority::High),
    ("Ana sayfa geliştirmesi", TaskStatus::InProgress, TaskPriority::High),
    ("API entegrasyonu", TaskStatus::Todo, TaskPriority::Medium),
    ("Mobil uyumluluk testleri", TaskStatus::Backlog, TaskPriority::Low),
    ("SEO optimizasyonu", TaskStatus::Backlog, TaskPriority::Medium),
];

/// (type, amount, description, days ago, category name)
const TRANSACTIONS: [(TransactionType, f64, &str, i64, &str); 6] = [
    (TransactionType::Income, 50000.0, "Proje A - İlk ödeme", 2, "Müşteri Ödemesi"),
    (TransactionType::Income, 25000.0, "Danışmanlık hizmeti", 5, "Danışmanlık"),
    (TransactionType::Expense, 15000.0, "Ofis kirası - Ocak", 1, "Kira"),
    (TransactionType::Expense, 35000.0, "Maaş ödemeleri", 3, "Maaş"),
    (TransactionType::Income, 10000.0, "Abonelik yenileme", 7, "Abonelik Geliri"),
    (TransactionType::Expense, 5000.0, "Yazılım lisansları", 4, "Yazılım Lisansları"),
];

/// Children before parents
const WIPE_ORDER: [&str; 13] = [
    "task_labels",
    "task_comments",
    "tasks",
    "project_members",
    "projects",
    "invoice_items",
    "invoices",
    "transactions",
    "categories",
    "labels",
    "activity_logs",
    "report_schedules",
    "users",
];

/// Delete every row from every table
pub async fn wipe(db: &Database) -> AppResult<()> {
    let mut tx = db.pool().begin().await?;
    for table in WIPE_ORDER {
        sqlx::query(&format!("DELETE FROM {}", table)).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Wipe the store and load the demo data set; returns the seeded users' emails
pub async fn seed_demo_data(db: &Database) -> AppResult<Vec<String>> {
    info!("Cleaning all tables...");
    wipe(db).await?;

    let mut seeded = Vec::with_capacity(SEED_USERS.len());
    for (name, email) in SEED_USERS {
        seeded.push(users::insert_user(db, name, email, SEED_PASSWORD, UserRole::Admin).await?);
    }
    let (owner, member) = match seeded.as_slice() {
        [owner, member] => (SessionUser::from(owner), member.clone()),
        _ => return Err(AppError::internal("seed users missing")),
    };

    let mut created_categories = Vec::with_capacity(CATEGORIES.len());
    for (name, kind, color, icon) in CATEGORIES {
        let input = CategoryInput {
            name: name.to_string(),
            kind,
            color: color.to_string(),
            icon: Some(icon.to_string()),
        };
        created_categories.push(categories::create_category(db, input).await?);
    }

    for (name, color) in LABELS {
        tasks::create_label(db, name, color).await?;
    }

    let now = Utc::now();
    let project = projects::create_project(
        db,
        &owner,
        ProjectInput {
            name: "Web Sitesi Yenileme".to_string(),
            description: Some("Şirket web sitesinin yeniden tasarlanması ve geliştirilmesi".to_string()),
            status: Some(ProjectStatus::Active),
            color: "#3b82f6".to_string(),
            budget: None,
            start_date: Some(now),
            end_date: Some(now + Duration::days(90)),
        },
    )
    .await?;
    let project_id = project.project.id.clone();

    members::add_member(
        db,
        &owner,
        &project_id,
        AddMemberRequest {
            user_id: member.id.clone(),
            role: Some(MemberRole::Member),
        },
    )
    .await?;

    for (title, status, priority) in TASKS {
        let req = CreateTaskRequest {
            title: title.to_string(),
            description: None,
            status: Some(status),
            priority: Some(priority),
            due_date: None,
            project_id: project_id.clone(),
            assignee_id: Some(member.id.clone()),
            label_ids: Vec::new(),
        };
        tasks::create_task(db, &owner, req).await?;
    }

    for (kind, amount, description, days_ago, category_name) in TRANSACTIONS {
        let Some(category) = created_categories.iter().find(|c| c.name == category_name) else {
            continue;
        };
        let input = TransactionInput {
            kind,
            amount,
            description: description.to_string(),
            date: now - Duration::days(days_ago),
            category_id: category.id.clone(),
        };
        transactions::create_transaction(db, &owner, input).await?;
    }

    info!("Seed completed successfully!");
    Ok(seeded.into_iter().map(|u| u.email).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::dashboard::dashboard_stats;
    use chrono::FixedOffset;

    #[tokio::test]
    async fn seeds_demo_data() {
        let db = Database::in_memory().await.unwrap();
        let emails = seed_demo_data(&db).await.unwrap();
        assert_eq!(emails, vec!["ikbal80koc@gmail.com", "eymenalpat0@gmail.com"]);

        assert_eq!(categories::list_categories(&db, None).await.unwrap().len(), 10);
        assert_eq!(tasks::list_labels(&db).await.unwrap().len(), 6);

        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let stats = dashboard_stats(&db, Utc::now(), offset).await.unwrap();
        assert_eq!(stats.total_income, 85000.0);
        assert_eq!(stats.total_expense, 55000.0);
        assert_eq!(stats.active_task_count, 4);
    }

    #[tokio::test]
    async fn reseeding_replaces_everything() {
        let db = Database::in_memory().await.unwrap();
        seed_demo_data(&db).await.unwrap();
        seed_demo_data(&db).await.unwrap();
        assert_eq!(users::count_users(&db).await.unwrap(), 2);
        assert_eq!(categories::list_categories(&db, None).await.unwrap().len(), 10);
    }
}
