use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use ts_rs::TS;

use super::UserSummary;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "models/")]
pub enum ProjectStatus {
    Planning,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "models/")]
pub enum MemberRole {
    Owner,
    Member,
    Viewer,
}

/// Kanban columns, in board order
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "models/")]
pub enum TaskStatus {
    Backlog,
    Todo,
    InProgress,
    InReview,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Backlog => "BACKLOG",
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::InReview => "IN_REVIEW",
            TaskStatus::Done => "DONE",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "models/")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

// ========================
// Projects
// ========================

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct ProjectMember {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
    pub user: UserSummary,
}

/// Columns expected by `ProjectMember::from_row`
pub const MEMBER_COLUMNS: &str = "m.id, m.project_id, m.user_id, m.role, m.joined_at, \
     u.id AS member_id, u.name AS member_name, u.email AS member_email";

impl<'r> FromRow<'r, SqliteRow> for ProjectMember {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let user = UserSummary::from_prefixed(row, "member")?
            .ok_or_else(|| sqlx::Error::ColumnNotFound("member_id".to_string()))?;
        Ok(Self {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            user_id: row.try_get("user_id")?,
            role: row.try_get("role")?,
            joined_at: row.try_get("joined_at")?,
            user,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub color: String,
    pub budget: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Project {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            status: row.try_get("status")?,
            color: row.try_get("color")?,
            budget: row.try_get("budget")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Project card for the listing page
#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub members: Vec<ProjectMember>,
    pub member_count: i64,
    pub task_count: i64,
}

/// Project with its board
#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub members: Vec<ProjectMember>,
    pub tasks: Vec<Task>,
}

#[derive(Clone, Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct ProjectInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    pub color: String,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct AddMemberRequest {
    pub user_id: String,
    #[serde(default)]
    pub role: Option<MemberRole>,
}

#[derive(Clone, Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct UpdateMemberRequest {
    pub role: MemberRole,
}

// ========================
// Tasks
// ========================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct Label {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl<'r> FromRow<'r, SqliteRow> for Label {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            color: row.try_get("color")?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub order: i64,
    pub project_id: String,
    pub project_name: String,
    pub assignee_id: Option<String>,
    pub assignee: Option<UserSummary>,
    pub creator_id: String,
    pub labels: Vec<Label>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns expected by `Task::from_row`
pub const TASK_COLUMNS: &str = "t.id, t.title, t.description, t.status, t.priority, t.due_date, \
     t.sort_order, t.project_id, t.assignee_id, t.creator_id, t.created_at, t.updated_at, \
     p.name AS project_name, \
     a.id AS assignee_ref_id, a.name AS assignee_ref_name, a.email AS assignee_ref_email";

/// Join clause matching `TASK_COLUMNS`
pub const TASK_FROM: &str = "FROM tasks t \
     JOIN projects p ON p.id = t.project_id \
     LEFT JOIN users a ON a.id = t.assignee_id";

impl<'r> FromRow<'r, SqliteRow> for Task {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            status: row.try_get("status")?,
            priority: row.try_get("priority")?,
            due_date: row.try_get("due_date")?,
            order: row.try_get("sort_order")?,
            project_id: row.try_get("project_id")?,
            project_name: row.try_get("project_name")?,
            assignee_id: row.try_get("assignee_id")?,
            assignee: UserSummary::from_prefixed(row, "assignee_ref")?,
            creator_id: row.try_get("creator_id")?,
            labels: Vec::new(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct TaskComment {
    pub id: String,
    pub content: String,
    pub task_id: String,
    pub user: UserSummary,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for TaskComment {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let user = UserSummary::from_prefixed(row, "author")?
            .ok_or_else(|| sqlx::Error::ColumnNotFound("author_id".to_string()))?;
        Ok(Self {
            id: row.try_get("id")?,
            content: row.try_get("content")?,
            task_id: row.try_get("task_id")?,
            user,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub comments: Vec<TaskComment>,
}

#[derive(Clone, Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    pub project_id: String,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub label_ids: Vec<String>,
}

/// Partial task update; absent fields are left untouched
#[derive(Clone, Debug, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<String>,
    pub label_ids: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct ReorderRequest {
    pub task_id: String,
    pub status: TaskStatus,
    pub order: i64,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    pub assignee_id: Option<String>,
    pub project_id: Option<String>,
    pub status: Option<TaskStatus>,
}

#[derive(Clone, Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct CommentInput {
    pub content: String,
}
