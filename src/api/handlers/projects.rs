//! Project and membership handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};

use crate::api::AppState;
use crate::commands::{members, projects, tasks};
use crate::error::AppResult;
use crate::models::{
    AddMemberRequest, ProjectDetail, ProjectInput, ProjectMember, ProjectSummary, SessionUser, Task,
    UpdateMemberRequest,
};

/// List projects the caller can see
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> AppResult<Json<Vec<ProjectSummary>>> {
    Ok(Json(projects::list_projects(&state.db, &user).await?))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(input): Json<ProjectInput>,
) -> AppResult<(StatusCode, Json<ProjectDetail>)> {
    let project = projects::create_project(&state.db, &user, input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ProjectDetail>> {
    Ok(Json(projects::get_project(&state.db, &user, &id).await?))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    Json(input): Json<ProjectInput>,
) -> AppResult<Json<ProjectDetail>> {
    Ok(Json(projects::update_project(&state.db, &user, &id, input).await?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    projects::delete_project(&state.db, &user, &id).await?;
    Ok(Json(json!({ "success": true })))
}

/// Kanban board contents of one project
pub async fn project_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Task>>> {
    Ok(Json(tasks::project_tasks(&state.db, &user, &id).await?))
}

// ========================
// Members
// ========================

pub async fn list_members(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<ProjectMember>>> {
    Ok(Json(members::project_members(&state.db, &user, &id).await?))
}

pub async fn add_member(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> AppResult<(StatusCode, Json<ProjectMember>)> {
    let member = members::add_member(&state.db, &user, &id, req).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn update_member(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path((id, member_id)): Path<(String, String)>,
    Json(req): Json<UpdateMemberRequest>,
) -> AppResult<Json<ProjectMember>> {
    Ok(Json(members::update_member(&state.db, &user, &id, &member_id, req).await?))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path((id, member_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    members::remove_member(&state.db, &user, &id, &member_id).await?;
    Ok(Json(json!({ "success": true })))
}
