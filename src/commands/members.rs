use chrono::Utc;

use super::projects::{list_members, require_access, require_manage};
use super::users::find_user;
use crate::constants::{MSG_ALREADY_MEMBER, MSG_LAST_OWNER, MSG_USER_NOT_FOUND};
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{AddMemberRequest, MemberRole, ProjectMember, SessionUser, UpdateMemberRequest};

const MSG_MEMBER_NOT_FOUND: &str = "Üye bulunamadı";

pub async fn project_members(db: &Database, user: &SessionUser, project_id: &str) -> AppResult<Vec<ProjectMember>> {
    require_access(db, user, project_id).await?;
    list_members(db, project_id).await
}

fn find_member<'a>(members: &'a [ProjectMember], member_id: &str) -> AppResult<&'a ProjectMember> {
    members
        .iter()
        .find(|m| m.id == member_id)
        .ok_or_else(|| AppError::not_found(MSG_MEMBER_NOT_FOUND))
}

fn owner_count(members: &[ProjectMember]) -> usize {
    members.iter().filter(|m| m.role == MemberRole::Owner).count()
}

pub async fn add_member(
    db: &Database,
    user: &SessionUser,
    project_id: &str,
    req: AddMemberRequest,
) -> AppResult<ProjectMember> {
    require_manage(db, user, project_id).await?;

    if find_user(db, &req.user_id).await?.is_none() {
        return Err(AppError::not_found(MSG_USER_NOT_FOUND));
    }
    let members = list_members(db, project_id).await?;
    if members.iter().any(|m| m.user_id == req.user_id) {
        return Err(AppError::invalid_params(MSG_ALREADY_MEMBER));
    }

    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO project_members (id, project_id, user_id, role, joined_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(project_id)
    .bind(&req.user_id)
    .bind(req.role.unwrap_or(MemberRole::Member))
    .bind(Utc::now())
    .execute(db.pool())
    .await?;

    let members = list_members(db, project_id).await?;
    find_member(&members, &id).cloned()
}

/// Change a member's role; the last owner cannot be demoted
pub async fn update_member(
    db: &Database,
    user: &SessionUser,
    project_id: &str,
    member_id: &str,
    req: UpdateMemberRequest,
) -> AppResult<ProjectMember> {
    require_manage(db, user, project_id).await?;

    let members = list_members(db, project_id).await?;
    let member = find_member(&members, member_id)?;
    if member.role == MemberRole::Owner && req.role != MemberRole::Owner && owner_count(&members) <= 1 {
        return Err(AppError::invalid_params(MSG_LAST_OWNER));
    }

    sqlx::query("UPDATE project_members SET role = ? WHERE id = ?")
        .bind(req.role)
        .bind(member_id)
        .execute(db.pool())
        .await?;

    let members = list_members(db, project_id).await?;
    find_member(&members, member_id).cloned()
}

/// Remove a member; the last owner cannot be removed
pub async fn remove_member(
    db: &Database,
    user: &SessionUser,
    project_id: &str,
    member_id: &str,
) -> AppResult<()> {
    require_manage(db, user, project_id).await?;

    let members = list_members(db, project_id).await?;
    let member = find_member(&members, member_id)?;
    if member.role == MemberRole::Owner && owner_count(&members) <= 1 {
        return Err(AppError::invalid_params(MSG_LAST_OWNER));
    }

    sqlx::query("DELETE FROM project_members WHERE id = ?")
        .bind(member_id)
        .execute(db.pool())
        .await?;
    Ok(())
}
