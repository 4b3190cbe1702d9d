use chrono::Utc;
use serde_json::json;
use sqlx::{FromRow, Row};

use super::activity::log_activity_quietly;
use crate::api::auth::{hash_password, verify_password};
use crate::constants::{
    MSG_CANNOT_DELETE_SELF, MSG_EMAIL_TAKEN, MSG_USER_NOT_FOUND, MSG_WRONG_PASSWORD,
    PROFILE_RECENT_TASKS,
};
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{
    AssignedTask, ChangePasswordRequest, CreateUserRequest, Membership, SessionUser,
    UpdateUserRequest, User, UserProfile, UserRole,
};
use crate::permissions::require_admin;
use crate::validation;

const USER_COLUMNS: &str = "id, name, email, image, role, created_at, updated_at";

pub async fn list_users(db: &Database) -> AppResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC",
        USER_COLUMNS
    ))
    .fetch_all(db.pool())
    .await?;
    Ok(users)
}

pub async fn find_user(db: &Database, id: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(db.pool())
        .await?;
    Ok(user)
}

pub async fn get_user(db: &Database, id: &str) -> AppResult<User> {
    find_user(db, id).await?.ok_or_else(AppError::record_not_found)
}

/// Look up a user and their password hash by email, for login
pub async fn find_credentials(db: &Database, email: &str) -> AppResult<Option<(User, String)>> {
    let row = sqlx::query(&format!(
        "SELECT {}, hashed_password FROM users WHERE email = ?",
        USER_COLUMNS
    ))
    .bind(email.trim().to_lowercase())
    .fetch_optional(db.pool())
    .await?;

    match row {
        Some(row) => {
            let hash: String = row.try_get("hashed_password")?;
            let user = User::from_row(&row)?;
            Ok(Some((user, hash)))
        }
        None => Ok(None),
    }
}

async fn email_owner(db: &Database, email: &str) -> AppResult<Option<String>> {
    let id = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(db.pool())
        .await?;
    Ok(id)
}

/// Insert a user without session checks (seed data, first admin)
pub async fn insert_user(
    db: &Database,
    name: &str,
    email: &str,
    password: &str,
    role: UserRole,
) -> AppResult<User> {
    let email = email.trim().to_lowercase();
    if email_owner(db, &email).await?.is_some() {
        return Err(AppError::invalid_params(MSG_EMAIL_TAKEN));
    }

    let hash = hash_password(password)?;
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO users (id, name, email, hashed_password, role, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name.trim())
    .bind(&email)
    .bind(hash)
    .bind(role)
    .bind(now)
    .bind(now)
    .execute(db.pool())
    .await?;

    get_user(db, &id).await
}

pub async fn create_user(
    db: &Database,
    actor: &SessionUser,
    req: CreateUserRequest,
) -> AppResult<User> {
    require_admin(actor)?;
    validation::validate_new_user(&req)?;

    let role = req.role.unwrap_or_default();
    let user = insert_user(db, &req.name, &req.email, &req.password, role).await?;

    log_activity_quietly(
        db,
        "created",
        "user",
        &user.id,
        &actor.id,
        Some(json!({ "userName": user.name, "userEmail": user.email })),
    )
    .await;

    Ok(user)
}

/// Profile page: the user, their latest assigned tasks and their projects
pub async fn get_profile(db: &Database, id: &str) -> AppResult<UserProfile> {
    let user = get_user(db, id).await?;

    let task_rows = sqlx::query(
        "SELECT t.id, t.title, t.status, t.priority, t.due_date, \
                p.id AS project_id, p.name AS project_name, p.color AS project_color \
         FROM tasks t JOIN projects p ON p.id = t.project_id \
         WHERE t.assignee_id = ? ORDER BY t.created_at DESC LIMIT ?",
    )
    .bind(id)
    .bind(PROFILE_RECENT_TASKS)
    .fetch_all(db.pool())
    .await?;

    let assigned_tasks = task_rows
        .iter()
        .map(|row| {
            Ok(AssignedTask {
                id: row.try_get("id")?,
                title: row.try_get("title")?,
                status: row.try_get("status")?,
                priority: row.try_get("priority")?,
                due_date: row.try_get("due_date")?,
                project_id: row.try_get("project_id")?,
                project_name: row.try_get("project_name")?,
                project_color: row.try_get("project_color")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    let member_rows = sqlx::query(
        "SELECT p.id, p.name, p.color, m.role FROM project_members m \
         JOIN projects p ON p.id = m.project_id \
         WHERE m.user_id = ? ORDER BY p.name",
    )
    .bind(id)
    .fetch_all(db.pool())
    .await?;

    let projects = member_rows
        .iter()
        .map(|row| {
            Ok(Membership {
                project_id: row.try_get("id")?,
                project_name: row.try_get("name")?,
                project_color: row.try_get("color")?,
                role: row.try_get("role")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(UserProfile {
        user,
        assigned_tasks,
        projects,
    })
}

pub async fn update_user(
    db: &Database,
    actor: &SessionUser,
    id: &str,
    req: UpdateUserRequest,
) -> AppResult<User> {
    if !actor.is_admin() && actor.id != id {
        return Err(AppError::forbidden());
    }
    validation::validate_user_edit(&req)?;

    let existing = get_user(db, id).await?;
    let email = req.email.trim().to_lowercase();
    if email != existing.email {
        if let Some(owner) = email_owner(db, &email).await? {
            if owner != id {
                return Err(AppError::invalid_params(MSG_EMAIL_TAKEN));
            }
        }
    }

    let role = match req.role {
        Some(role) if actor.is_admin() => role,
        _ => existing.role,
    };

    let mut tx = db.pool().begin().await?;
    sqlx::query("UPDATE users SET name = ?, email = ?, role = ?, updated_at = ? WHERE id = ?")
        .bind(req.name.trim())
        .bind(&email)
        .bind(role)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if let Some(password) = req.password.as_deref().filter(|p| !p.trim().is_empty()) {
        sqlx::query("UPDATE users SET hashed_password = ? WHERE id = ?")
            .bind(hash_password(password)?)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let user = get_user(db, id).await?;
    log_activity_quietly(
        db,
        "updated",
        "user",
        &user.id,
        &actor.id,
        Some(json!({ "userName": user.name, "userEmail": user.email })),
    )
    .await;

    Ok(user)
}

pub async fn delete_user(db: &Database, actor: &SessionUser, id: &str) -> AppResult<()> {
    if actor.id == id {
        return Err(AppError::invalid_params(MSG_CANNOT_DELETE_SELF));
    }
    require_admin(actor)?;

    let user = find_user(db, id)
        .await?
        .ok_or_else(|| AppError::not_found(MSG_USER_NOT_FOUND))?;

    // The audit entry is attributed to the actor, so it survives the cascade
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(db.pool())
        .await?;

    log_activity_quietly(
        db,
        "deleted",
        "user",
        &user.id,
        &actor.id,
        Some(json!({ "userName": user.name, "userEmail": user.email })),
    )
    .await;

    Ok(())
}

/// Self-service password change from the settings page
pub async fn change_password(
    db: &Database,
    actor: &SessionUser,
    id: &str,
    req: ChangePasswordRequest,
) -> AppResult<()> {
    if actor.id != id {
        return Err(AppError::forbidden());
    }
    validation::validate_password(&req.new_password)?;

    let (_, hash) = find_credentials(db, &actor.email)
        .await?
        .ok_or_else(AppError::record_not_found)?;
    if !verify_password(&req.current_password, &hash)? {
        return Err(AppError::invalid_params(MSG_WRONG_PASSWORD));
    }

    sqlx::query("UPDATE users SET hashed_password = ?, updated_at = ? WHERE id = ?")
        .bind(hash_password(&req.new_password)?)
        .bind(Utc::now())
        .bind(id)
        .execute(db.pool())
        .await?;

    log_activity_quietly(db, "password_changed", "user", id, &actor.id, None).await;
    Ok(())
}

pub async fn count_users(db: &Database) -> AppResult<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(db.pool())
        .await?;
    Ok(count)
}
