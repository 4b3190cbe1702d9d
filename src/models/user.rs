use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use ts_rs::TS;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "models/")]
pub enum UserRole {
    Admin,
    User,
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::User
    }
}

/// A team member as exposed over the API (never carries the password hash)
#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for User {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            image: row.try_get("image")?,
            role: row.try_get("role")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Name/email pair embedded in other records
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl UserSummary {
    /// Read a summary from aliased join columns `<prefix>_id`, `<prefix>_name`, `<prefix>_email`
    pub fn from_prefixed(row: &SqliteRow, prefix: &str) -> Result<Option<Self>, sqlx::Error> {
        let id: Option<String> = row.try_get(format!("{}_id", prefix).as_str())?;
        match id {
            Some(id) => Ok(Some(Self {
                id,
                name: row.try_get(format!("{}_name", prefix).as_str())?,
                email: row.try_get(format!("{}_email", prefix).as_str())?,
            })),
            None => Ok(None),
        }
    }
}

/// The authenticated caller, resolved from a session token
#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl SessionUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Clone, Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Clone, Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
    /// Empty or absent keeps the current password
    #[serde(default)]
    pub password: Option<String>,
    /// Only honoured for admins
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Clone, Debug, Deserialize, TS)]
#[ts(export, export_to = "models/")]
pub struct ChangePasswordRequest {
    #[serde(alias = "currentPassword")]
    pub current_password: String,
    #[serde(alias = "newPassword")]
    pub new_password: String,
}

/// A task assigned to a user, as shown on their profile
#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct AssignedTask {
    pub id: String,
    pub title: String,
    pub status: super::TaskStatus,
    pub priority: super::TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub project_id: String,
    pub project_name: String,
    pub project_color: String,
}

/// Project membership shown on a profile
#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct Membership {
    pub project_id: String,
    pub project_name: String,
    pub project_color: String,
    pub role: super::MemberRole,
}

#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub assigned_tasks: Vec<AssignedTask>,
    pub projects: Vec<Membership>,
}
