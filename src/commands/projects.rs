use chrono::Utc;

use super::tasks::load_project_tasks;
use crate::constants::MSG_PROJECT_NOT_FOUND;
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{
    MemberRole, Project, ProjectDetail, ProjectInput, ProjectMember, ProjectStatus, ProjectSummary,
    SessionUser, MEMBER_COLUMNS,
};
use crate::permissions::{can_access_project, can_manage_project, MemberRef};
use crate::validation;

const PROJECT_COLUMNS: &str = "p.id, p.name, p.description, p.status, p.color, p.budget, \
     p.start_date, p.end_date, p.created_at, p.updated_at";

// ========================
// Access checks
// ========================

async fn member_refs(db: &Database, project_id: &str) -> AppResult<Vec<MemberRef>> {
    let refs = sqlx::query_as::<_, MemberRef>("SELECT user_id, role FROM project_members WHERE project_id = ?")
        .bind(project_id)
        .fetch_all(db.pool())
        .await?;
    Ok(refs)
}

async fn project_exists(db: &Database, project_id: &str) -> AppResult<()> {
    let found: Option<String> = sqlx::query_scalar("SELECT id FROM projects WHERE id = ?")
        .bind(project_id)
        .fetch_optional(db.pool())
        .await?;
    found
        .map(|_| ())
        .ok_or_else(|| AppError::not_found(MSG_PROJECT_NOT_FOUND))
}

/// 404 when the project is missing, 403 when the caller is not a member
pub async fn require_access(db: &Database, user: &SessionUser, project_id: &str) -> AppResult<()> {
    project_exists(db, project_id).await?;
    if can_access_project(user, &member_refs(db, project_id).await?) {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

/// 404 when the project is missing, 403 unless admin or project owner
pub async fn require_manage(db: &Database, user: &SessionUser, project_id: &str) -> AppResult<()> {
    project_exists(db, project_id).await?;
    if can_manage_project(user, &member_refs(db, project_id).await?) {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

// ========================
// Queries
// ========================

pub async fn list_members(db: &Database, project_id: &str) -> AppResult<Vec<ProjectMember>> {
    let members = sqlx::query_as::<_, ProjectMember>(&format!(
        "SELECT {} FROM project_members m JOIN users u ON u.id = m.user_id \
         WHERE m.project_id = ? ORDER BY m.joined_at",
        MEMBER_COLUMNS
    ))
    .bind(project_id)
    .fetch_all(db.pool())
    .await?;
    Ok(members)
}

async fn find_project(db: &Database, id: &str) -> AppResult<Project> {
    sqlx::query_as::<_, Project>(&format!("SELECT {} FROM projects p WHERE p.id = ?", PROJECT_COLUMNS))
        .bind(id)
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| AppError::not_found(MSG_PROJECT_NOT_FOUND))
}

/// Projects the caller belongs to (all for admins), most recently updated first
pub async fn list_projects(db: &Database, user: &SessionUser) -> AppResult<Vec<ProjectSummary>> {
    let projects = if user.is_admin() {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {} FROM projects p ORDER BY p.updated_at DESC",
            PROJECT_COLUMNS
        ))
        .fetch_all(db.pool())
        .await?
    } else {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {} FROM projects p JOIN project_members m ON m.project_id = p.id \
             WHERE m.user_id = ? ORDER BY p.updated_at DESC",
            PROJECT_COLUMNS
        ))
        .bind(&user.id)
        .fetch_all(db.pool())
        .await?
    };

    let mut summaries = Vec::with_capacity(projects.len());
    for project in projects {
        let members = list_members(db, &project.id).await?;
        let task_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE project_id = ?")
            .bind(&project.id)
            .fetch_one(db.pool())
            .await?;
        summaries.push(ProjectSummary {
            member_count: members.len() as i64,
            task_count,
            members,
            project,
        });
    }
    Ok(summaries)
}

pub async fn get_project(db: &Database, user: &SessionUser, id: &str) -> AppResult<ProjectDetail> {
    require_access(db, user, id).await?;
    let project = find_project(db, id).await?;
    let members = list_members(db, id).await?;
    let tasks = load_project_tasks(db, id).await?;
    Ok(ProjectDetail {
        project,
        members,
        tasks,
    })
}

// ========================
// Mutations
// ========================

/// Create a project; the creator joins as its owner
pub async fn create_project(db: &Database, user: &SessionUser, input: ProjectInput) -> AppResult<ProjectDetail> {
    validation::validate_project(&input)?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();

    let mut tx = db.pool().begin().await?;
    sqlx::query(
        "INSERT INTO projects (id, name, description, status, color, budget, start_date, end_date, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(input.name.trim())
    .bind(input.description.as_deref().filter(|d| !d.is_empty()))
    .bind(input.status.unwrap_or(ProjectStatus::Planning))
    .bind(&input.color)
    .bind(input.budget)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO project_members (id, project_id, user_id, role, joined_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&id)
    .bind(&user.id)
    .bind(MemberRole::Owner)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    get_project(db, user, &id).await
}

pub async fn update_project(
    db: &Database,
    user: &SessionUser,
    id: &str,
    input: ProjectInput,
) -> AppResult<ProjectDetail> {
    require_manage(db, user, id).await?;
    validation::validate_project(&input)?;
    let existing = find_project(db, id).await?;

    sqlx::query(
        "UPDATE projects SET name = ?, description = ?, status = ?, color = ?, budget = ?, \
         start_date = ?, end_date = ?, updated_at = ? WHERE id = ?",
    )
    .bind(input.name.trim())
    .bind(input.description.as_deref().filter(|d| !d.is_empty()))
    .bind(input.status.unwrap_or(existing.status))
    .bind(&input.color)
    .bind(input.budget)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(Utc::now())
    .bind(id)
    .execute(db.pool())
    .await?;

    get_project(db, user, id).await
}

/// Delete a project with its members, tasks and comments
pub async fn delete_project(db: &Database, user: &SessionUser, id: &str) -> AppResult<()> {
    require_manage(db, user, id).await?;
    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(db.pool())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{admin, as_session, seed_user};
    use crate::error::ErrorCode;

    fn input(name: &str) -> ProjectInput {
        ProjectInput {
            name: name.to_string(),
            description: Some("Kurumsal site".to_string()),
            status: None,
            color: "#6366f1".to_string(),
            budget: Some(50000.0),
            start_date: None,
            end_date: None,
        }
    }

    #[tokio::test]
    async fn creator_becomes_owner() {
        let db = Database::in_memory().await.unwrap();
        admin(&db).await;
        let user = as_session(&seed_user(&db, "Mert", "mert@example.com").await);

        let detail = create_project(&db, &user, input("Web Sitesi Yenileme")).await.unwrap();
        assert_eq!(detail.project.status, ProjectStatus::Planning);
        assert_eq!(detail.members.len(), 1);
        assert_eq!(detail.members[0].user_id, user.id);
        assert_eq!(detail.members[0].role, MemberRole::Owner);
        assert!(detail.tasks.is_empty());
    }

    #[tokio::test]
    async fn listing_shows_memberships_or_everything_for_admin() {
        let db = Database::in_memory().await.unwrap();
        let boss = admin(&db).await;
        let a = as_session(&seed_user(&db, "Ayşe", "ayse@example.com").await);
        let b = as_session(&seed_user(&db, "Burak", "burak@example.com").await);

        create_project(&db, &a, input("A")).await.unwrap();
        create_project(&db, &b, input("B")).await.unwrap();

        let mine = list_projects(&db, &a).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].project.name, "A");
        assert_eq!(mine[0].member_count, 1);
        assert_eq!(mine[0].task_count, 0);

        assert_eq!(list_projects(&db, &boss).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn outsiders_and_plain_members_are_refused() {
        let db = Database::in_memory().await.unwrap();
        admin(&db).await;
        let owner = as_session(&seed_user(&db, "Sahip", "owner@example.com").await);
        let outsider = as_session(&seed_user(&db, "Yabancı", "out@example.com").await);

        let project = create_project(&db, &owner, input("Gizli")).await.unwrap().project;

        let err = get_project(&db, &outsider, &project.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
        let err = delete_project(&db, &outsider, &project.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
        let err = get_project(&db, &owner, "missing").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let mut changes = input("Gizli v2");
        changes.status = Some(ProjectStatus::Active);
        let updated = update_project(&db, &owner, &project.id, changes).await.unwrap();
        assert_eq!(updated.project.name, "Gizli v2");
        assert_eq!(updated.project.status, ProjectStatus::Active);

        delete_project(&db, &owner, &project.id).await.unwrap();
        assert!(list_projects(&db, &owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn negative_budget_rejected() {
        let db = Database::in_memory().await.unwrap();
        let boss = admin(&db).await;
        let mut bad = input("X");
        bad.budget = Some(-1.0);
        let err = create_project(&db, &boss, bad).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
    }
}
