//! Tasks, kanban ordering, comments and labels
//!
//! Within a (project, status) column `sort_order` is kept dense and
//! zero-based: creation appends, and a move renumbers both the column the
//! task leaves and the column it enters inside one database transaction.

use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use std::collections::HashMap;
use tracing::debug;

use super::projects::require_access;
use super::users::find_user;
use crate::constants::{MSG_TASK_NOT_FOUND, MSG_USER_NOT_FOUND};
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{
    CommentInput, CreateTaskRequest, Label, ReorderRequest, SessionUser, Task, TaskComment, TaskDetail,
    TaskFilter, TaskPriority, TaskStatus, UpdateTaskRequest, TASK_COLUMNS, TASK_FROM,
};
use crate::validation;

/// Board order of the status columns
const STATUS_RANK: &str = "CASE t.status WHEN 'BACKLOG' THEN 0 WHEN 'TODO' THEN 1 \
     WHEN 'IN_PROGRESS' THEN 2 WHEN 'IN_REVIEW' THEN 3 ELSE 4 END";

const MSG_LABEL_NOT_FOUND: &str = "Etiket bulunamadı";

// ========================
// Loading
// ========================

async fn attach_labels(db: &Database, tasks: &mut [Task]) -> AppResult<()> {
    if tasks.is_empty() {
        return Ok(());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT tl.task_id, l.id, l.name, l.color FROM task_labels tl \
         JOIN labels l ON l.id = tl.label_id WHERE tl.task_id IN (",
    );
    let mut ids = qb.separated(", ");
    for task in tasks.iter() {
        ids.push_bind(task.id.clone());
    }
    qb.push(") ORDER BY l.name");

    let rows = qb.build().fetch_all(db.pool()).await?;
    let mut by_task: HashMap<String, Vec<Label>> = HashMap::new();
    for row in rows {
        let task_id: String = row.try_get("task_id")?;
        by_task.entry(task_id).or_default().push(Label {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            color: row.try_get("color")?,
        });
    }

    for task in tasks.iter_mut() {
        task.labels = by_task.remove(&task.id).unwrap_or_default();
    }
    Ok(())
}

async fn find_task(db: &Database, id: &str) -> AppResult<Task> {
    let task = sqlx::query_as::<_, Task>(&format!("SELECT {} {} WHERE t.id = ?", TASK_COLUMNS, TASK_FROM))
        .bind(id)
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| AppError::not_found(MSG_TASK_NOT_FOUND))?;

    let mut tasks = [task];
    attach_labels(db, &mut tasks).await?;
    let [task] = tasks;
    Ok(task)
}

/// Load a task and check the caller may access its project
async fn accessible_task(db: &Database, user: &SessionUser, id: &str) -> AppResult<Task> {
    let task = find_task(db, id).await?;
    require_access(db, user, &task.project_id).await?;
    Ok(task)
}

/// A project's board, in column then position order
pub async fn load_project_tasks(db: &Database, project_id: &str) -> AppResult<Vec<Task>> {
    let mut tasks = sqlx::query_as::<_, Task>(&format!(
        "SELECT {} {} WHERE t.project_id = ? ORDER BY {}, t.sort_order",
        TASK_COLUMNS, TASK_FROM, STATUS_RANK
    ))
    .bind(project_id)
    .fetch_all(db.pool())
    .await?;
    attach_labels(db, &mut tasks).await?;
    Ok(tasks)
}

pub async fn project_tasks(db: &Database, user: &SessionUser, project_id: &str) -> AppResult<Vec<Task>> {
    require_access(db, user, project_id).await?;
    load_project_tasks(db, project_id).await
}

/// Tasks across every project the caller can access
pub async fn list_tasks(db: &Database, user: &SessionUser, filter: &TaskFilter) -> AppResult<Vec<Task>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} {} WHERE 1 = 1", TASK_COLUMNS, TASK_FROM));
    if !user.is_admin() {
        qb.push(" AND t.project_id IN (SELECT project_id FROM project_members WHERE user_id = ")
            .push_bind(&user.id)
            .push(")");
    }
    if let Some(assignee) = filter.assignee_id.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND t.assignee_id = ").push_bind(assignee);
    }
    if let Some(project) = filter.project_id.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND t.project_id = ").push_bind(project);
    }
    if let Some(status) = filter.status {
        qb.push(" AND t.status = ").push_bind(status);
    }
    qb.push(format!(" ORDER BY {}, t.sort_order", STATUS_RANK));

    let mut tasks = qb.build_query_as::<Task>().fetch_all(db.pool()).await?;
    attach_labels(db, &mut tasks).await?;
    Ok(tasks)
}

pub async fn get_task(db: &Database, user: &SessionUser, id: &str) -> AppResult<TaskDetail> {
    let task = accessible_task(db, user, id).await?;
    let comments = load_comments(db, id).await?;
    Ok(TaskDetail { task, comments })
}

// ========================
// Mutations
// ========================

async fn check_assignee(db: &Database, assignee_id: Option<&str>) -> AppResult<()> {
    if let Some(id) = assignee_id {
        if find_user(db, id).await?.is_none() {
            return Err(AppError::invalid_params(MSG_USER_NOT_FOUND));
        }
    }
    Ok(())
}

async fn check_labels(db: &Database, label_ids: &[String]) -> AppResult<()> {
    for id in label_ids {
        let found: Option<String> = sqlx::query_scalar("SELECT id FROM labels WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?;
        if found.is_none() {
            return Err(AppError::invalid_params(MSG_LABEL_NOT_FOUND));
        }
    }
    Ok(())
}

async fn replace_labels(conn: &mut SqliteConnection, task_id: &str, label_ids: &[String]) -> AppResult<()> {
    sqlx::query("DELETE FROM task_labels WHERE task_id = ?")
        .bind(task_id)
        .execute(&mut *conn)
        .await?;
    for label_id in label_ids {
        sqlx::query("INSERT OR IGNORE INTO task_labels (task_id, label_id) VALUES (?, ?)")
            .bind(task_id)
            .bind(label_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Next free position at the bottom of a column
async fn next_order(conn: &mut SqliteConnection, project_id: &str, status: TaskStatus) -> AppResult<i64> {
    let max: Option<i64> =
        sqlx::query_scalar("SELECT MAX(sort_order) FROM tasks WHERE project_id = ? AND status = ?")
            .bind(project_id)
            .bind(status)
            .fetch_one(&mut *conn)
            .await?;
    Ok(max.map_or(0, |m| m + 1))
}

fn blank_to_none(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub async fn create_task(db: &Database, user: &SessionUser, req: CreateTaskRequest) -> AppResult<Task> {
    validation::validate_task(&req)?;
    require_access(db, user, &req.project_id).await?;

    let assignee = blank_to_none(req.assignee_id.as_deref());
    check_assignee(db, assignee).await?;
    check_labels(db, &req.label_ids).await?;

    let id = uuid::Uuid::new_v4().to_string();
    let status = req.status.unwrap_or(TaskStatus::Todo);
    let now = Utc::now();

    let mut tx = db.pool().begin().await?;
    let order = next_order(&mut tx, &req.project_id, status).await?;
    sqlx::query(
        "INSERT INTO tasks (id, title, description, status, priority, due_date, sort_order, project_id, \
         assignee_id, creator_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(req.title.trim())
    .bind(blank_to_none(req.description.as_deref()))
    .bind(status)
    .bind(req.priority.unwrap_or(TaskPriority::Medium))
    .bind(req.due_date)
    .bind(order)
    .bind(&req.project_id)
    .bind(assignee)
    .bind(&user.id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    replace_labels(&mut tx, &id, &req.label_ids).await?;
    tx.commit().await?;

    find_task(db, &id).await
}

/// Apply a partial update. A status change moves the task to the bottom of
/// its new column.
pub async fn update_task(
    db: &Database,
    user: &SessionUser,
    id: &str,
    req: UpdateTaskRequest,
) -> AppResult<Task> {
    let task = accessible_task(db, user, id).await?;

    if let Some(title) = req.title.as_deref() {
        if title.trim().is_empty() {
            return Err(AppError::invalid_params("Başlık gereklidir"));
        }
    }
    // An empty assignee id unassigns
    let assignee = match req.assignee_id.as_deref() {
        Some(raw) => blank_to_none(Some(raw)).map(str::to_string),
        None => task.assignee_id.clone(),
    };
    check_assignee(db, assignee.as_deref()).await?;
    if let Some(labels) = &req.label_ids {
        check_labels(db, labels).await?;
    }

    let status = req.status.unwrap_or(task.status);
    let mut tx = db.pool().begin().await?;
    let order = if status != task.status {
        next_order(&mut tx, &task.project_id, status).await?
    } else {
        task.order
    };

    sqlx::query(
        "UPDATE tasks SET title = ?, description = ?, status = ?, priority = ?, due_date = ?, \
         sort_order = ?, assignee_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(req.title.as_deref().map(str::trim).unwrap_or(&task.title))
    .bind(match req.description.as_deref() {
        Some(d) => blank_to_none(Some(d)).map(str::to_string),
        None => task.description.clone(),
    })
    .bind(status)
    .bind(req.priority.unwrap_or(task.priority))
    .bind(req.due_date.or(task.due_date))
    .bind(order)
    .bind(assignee)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if status != task.status {
        renumber_column(&mut tx, &task.project_id, task.status, id, None).await?;
    }
    if let Some(labels) = &req.label_ids {
        replace_labels(&mut tx, id, labels).await?;
    }
    tx.commit().await?;

    find_task(db, id).await
}

pub async fn delete_task(db: &Database, user: &SessionUser, id: &str) -> AppResult<()> {
    let task = accessible_task(db, user, id).await?;

    let mut tx = db.pool().begin().await?;
    sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    renumber_column(&mut tx, &task.project_id, task.status, id, None).await?;
    tx.commit().await?;
    Ok(())
}

// ========================
// Kanban reorder
// ========================

/// Ids in a column by current position, without `exclude`
async fn column_ids(
    conn: &mut SqliteConnection,
    project_id: &str,
    status: TaskStatus,
    exclude: &str,
) -> AppResult<Vec<String>> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT id FROM tasks WHERE project_id = ? AND status = ? AND id != ? \
         ORDER BY sort_order, created_at",
    )
    .bind(project_id)
    .bind(status)
    .bind(exclude)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

/// Write dense positions for a column. Siblings only get a new `sort_order`;
/// `moved` also takes the column status and a fresh `updated_at`.
async fn write_positions(
    conn: &mut SqliteConnection,
    status: TaskStatus,
    ids: &[String],
    moved: Option<&str>,
) -> AppResult<()> {
    for (position, id) in ids.iter().enumerate() {
        if moved == Some(id.as_str()) {
            sqlx::query("UPDATE tasks SET status = ?, sort_order = ?, updated_at = ? WHERE id = ?")
                .bind(status)
                .bind(position as i64)
                .bind(Utc::now())
                .bind(id)
                .execute(&mut *conn)
                .await?;
        } else {
            sqlx::query("UPDATE tasks SET sort_order = ? WHERE id = ?")
                .bind(position as i64)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

/// Close the gaps in a column left by `task_id`, or splice it back in at `insert_at`
async fn renumber_column(
    conn: &mut SqliteConnection,
    project_id: &str,
    status: TaskStatus,
    task_id: &str,
    insert_at: Option<usize>,
) -> AppResult<()> {
    let mut ids = column_ids(conn, project_id, status, task_id).await?;
    let moved = insert_at.map(|position| {
        ids.insert(position.min(ids.len()), task_id.to_string());
        task_id
    });
    write_positions(conn, status, &ids, moved).await
}

/// Move a task to `status` at `order`, renumbering both affected columns
pub async fn reorder_task(db: &Database, user: &SessionUser, req: ReorderRequest) -> AppResult<Task> {
    if req.order < 0 {
        return Err(AppError::invalid_params("Sıra negatif olamaz"));
    }
    let task = accessible_task(db, user, &req.task_id).await?;

    let mut tx = db.pool().begin().await?;
    if task.status != req.status {
        renumber_column(&mut tx, &task.project_id, task.status, &task.id, None).await?;
    }
    renumber_column(
        &mut tx,
        &task.project_id,
        req.status,
        &task.id,
        Some(req.order as usize),
    )
    .await?;
    tx.commit().await?;

    debug!(
        "[Tasks] Moved {} from {} to {}#{}",
        task.id,
        task.status.as_str(),
        req.status.as_str(),
        req.order
    );
    find_task(db, &task.id).await
}

// ========================
// Comments and labels
// ========================

async fn load_comments(db: &Database, task_id: &str) -> AppResult<Vec<TaskComment>> {
    let comments = sqlx::query_as::<_, TaskComment>(
        "SELECT c.id, c.content, c.task_id, c.created_at, \
                u.id AS author_id, u.name AS author_name, u.email AS author_email \
         FROM task_comments c JOIN users u ON u.id = c.user_id \
         WHERE c.task_id = ? ORDER BY c.created_at",
    )
    .bind(task_id)
    .fetch_all(db.pool())
    .await?;
    Ok(comments)
}

pub async fn list_comments(db: &Database, user: &SessionUser, task_id: &str) -> AppResult<Vec<TaskComment>> {
    accessible_task(db, user, task_id).await?;
    load_comments(db, task_id).await
}

pub async fn add_comment(
    db: &Database,
    user: &SessionUser,
    task_id: &str,
    input: CommentInput,
) -> AppResult<TaskComment> {
    validation::validate_comment(&input.content)?;
    accessible_task(db, user, task_id).await?;

    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO task_comments (id, content, task_id, user_id, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&id)
        .bind(input.content.trim())
        .bind(task_id)
        .bind(&user.id)
        .bind(Utc::now())
        .execute(db.pool())
        .await?;

    load_comments(db, task_id)
        .await?
        .into_iter()
        .find(|c| c.id == id)
        .ok_or_else(AppError::record_not_found)
}

pub async fn list_labels(db: &Database) -> AppResult<Vec<Label>> {
    let labels = sqlx::query_as::<_, Label>("SELECT id, name, color FROM labels ORDER BY name")
        .fetch_all(db.pool())
        .await?;
    Ok(labels)
}

pub async fn create_label(db: &Database, name: &str, color: &str) -> AppResult<Label> {
    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO labels (id, name, color) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(name)
        .bind(color)
        .execute(db.pool())
        .await?;
    Ok(Label {
        id,
        name: name.to_string(),
        color: color.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::projects::create_project;
    use crate::commands::testing::{admin, as_session, seed_user};
    use crate::error::ErrorCode;
    use crate::models::ProjectInput;

    async fn project(db: &Database, owner: &SessionUser) -> String {
        create_project(
            db,
            owner,
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
        .id
    }

    fn new_task(project_id: &str, title: &str, status: TaskStatus) -> CreateTaskRequest {
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

    async fn column(db: &Database, project_id: &str, status: TaskStatus) -> Vec<(String, i64)> {
        load_project_tasks(db, project_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|t| t.status == status)
            .map(|t| (t.title, t.order))
            .collect()
    }

    #[tokio::test]
    async fn create_appends_to_column() {
        let db = Database::in_memory().await.unwrap();
        let owner = admin(&db).await;
        let pid = project(&db, &owner).await;

        let a = create_task(&db, &owner, new_task(&pid, "A", TaskStatus::Todo)).await.unwrap();
        let b = create_task(&db, &owner, new_task(&pid, "B", TaskStatus::Todo)).await.unwrap();
        let c = create_task(&db, &owner, new_task(&pid, "C", TaskStatus::Done)).await.unwrap();
        assert_eq!((a.order, b.order, c.order), (0, 1, 0));
        assert_eq!(a.priority, TaskPriority::Medium);
        assert_eq!(a.project_name, "Pano");
    }

    #[tokio::test]
    async fn reorder_across_columns_renumbers_both() {
        let db = Database::in_memory().await.unwrap();
        let owner = admin(&db).await;
        let pid = project(&db, &owner).await;

        let mut todo = Vec::new();
        for title in ["A", "B", "C"] {
            todo.push(create_task(&db, &owner, new_task(&pid, title, TaskStatus::Todo)).await.unwrap());
        }
        for title in ["X", "Y"] {
            create_task(&db, &owner, new_task(&pid, title, TaskStatus::InProgress)).await.unwrap();
        }

        let moved = reorder_task(
            &db,
            &owner,
            ReorderRequest {
                task_id: todo[1].id.clone(),
                status: TaskStatus::InProgress,
                order: 1,
            },
        )
        .await
        .unwrap();
        assert_eq!(moved.status, TaskStatus::InProgress);
        assert_eq!(moved.order, 1);

        assert_eq!(
            column(&db, &pid, TaskStatus::Todo).await,
            vec![("A".to_string(), 0), ("C".to_string(), 1)]
        );
        assert_eq!(
            column(&db, &pid, TaskStatus::InProgress).await,
            vec![("X".to_string(), 0), ("B".to_string(), 1), ("Y".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn reorder_within_column_and_past_end() {
        let db = Database::in_memory().await.unwrap();
        let owner = admin(&db).await;
        let pid = project(&db, &owner).await;

        let mut ids = Vec::new();
        for title in ["A", "B", "C"] {
            ids.push(create_task(&db, &owner, new_task(&pid, title, TaskStatus::Todo)).await.unwrap().id);
        }

        reorder_task(
            &db,
            &owner,
            ReorderRequest {
                task_id: ids[2].clone(),
                status: TaskStatus::Todo,
                order: 0,
            },
        )
        .await
        .unwrap();
        assert_eq!(
            column(&db, &pid, TaskStatus::Todo).await,
            vec![("C".to_string(), 0), ("A".to_string(), 1), ("B".to_string(), 2)]
        );

        // Positions beyond the column clamp to the end
        reorder_task(
            &db,
            &owner,
            ReorderRequest {
                task_id: ids[2].clone(),
                status: TaskStatus::Done,
                order: 40,
            },
        )
        .await
        .unwrap();
        assert_eq!(column(&db, &pid, TaskStatus::Done).await, vec![("C".to_string(), 0)]);
        assert_eq!(
            column(&db, &pid, TaskStatus::Todo).await,
            vec![("A".to_string(), 0), ("B".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn reorder_requires_membership() {
        let db = Database::in_memory().await.unwrap();
        admin(&db).await;
        let owner = as_session(&seed_user(&db, "Sahip", "owner@example.com").await);
        let outsider = as_session(&seed_user(&db, "Yabancı", "out@example.com").await);
        let pid = project(&db, &owner).await;
        let task = create_task(&db, &owner, new_task(&pid, "A", TaskStatus::Todo)).await.unwrap();

        let req = ReorderRequest {
            task_id: task.id.clone(),
            status: TaskStatus::Done,
            order: 0,
        };
        let err = reorder_task(&db, &outsider, req.clone()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);

        let err = reorder_task(
            &db,
            &owner,
            ReorderRequest {
                order: -1,
                ..req
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);

        assert!(list_tasks(&db, &outsider, &TaskFilter::default()).await.unwrap().is_empty());
        assert_eq!(list_tasks(&db, &owner, &TaskFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn labels_comments_and_status_update() {
        let db = Database::in_memory().await.unwrap();
        let owner = admin(&db).await;
        let pid = project(&db, &owner).await;
        let bug = create_label(&db, "Bug", "#ef4444").await.unwrap();

        let mut req = new_task(&pid, "Hata", TaskStatus::Todo);
        req.label_ids = vec![bug.id.clone()];
        let task = create_task(&db, &owner, req).await.unwrap();
        assert_eq!(task.labels, vec![bug.clone()]);

        let err = add_comment(&db, &owner, &task.id, CommentInput { content: "  ".to_string() })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
        add_comment(&db, &owner, &task.id, CommentInput { content: "İlk".to_string() }).await.unwrap();
        add_comment(&db, &owner, &task.id, CommentInput { content: "İkinci".to_string() }).await.unwrap();

        let detail = get_task(&db, &owner, &task.id).await.unwrap();
        assert_eq!(detail.comments.len(), 2);
        assert_eq!(detail.comments[0].content, "İlk");

        let updated = update_task(
            &db,
            &owner,
            &task.id,
            UpdateTaskRequest {
                status: Some(TaskStatus::Done),
                label_ids: Some(Vec::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.status, TaskStatus::Done);
        assert_eq!(updated.title, "Hata");
        assert!(updated.labels.is_empty());

        delete_task(&db, &owner, &task.id).await.unwrap();
        assert!(list_tasks(&db, &owner, &TaskFilter::default()).await.unwrap().is_empty());
    }
}
