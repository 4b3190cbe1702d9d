//! Task, comment and label handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};

use crate::api::AppState;
use crate::commands::tasks;
use crate::error::AppResult;
use crate::models::{
    CommentInput, CreateTaskRequest, Label, ReorderRequest, SessionUser, Task, TaskComment, TaskDetail,
    TaskFilter, UpdateTaskRequest,
};

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Query(filter): Query<TaskFilter>,
) -> AppResult<Json<Vec<Task>>> {
    Ok(Json(tasks::list_tasks(&state.db, &user, &filter).await?))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(req): Json<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let task = tasks::create_task(&state.db, &user, req).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> AppResult<Json<TaskDetail>> {
    Ok(Json(tasks::get_task(&state.db, &user, &id).await?))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> AppResult<Json<Task>> {
    Ok(Json(tasks::update_task(&state.db, &user, &id, req).await?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    tasks::delete_task(&state.db, &user, &id).await?;
    Ok(Json(json!({ "success": true })))
}

/// Drag and drop on the kanban board
pub async fn reorder_task(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(req): Json<ReorderRequest>,
) -> AppResult<Json<Task>> {
    Ok(Json(tasks::reorder_task(&state.db, &user, req).await?))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<TaskComment>>> {
    Ok(Json(tasks::list_comments(&state.db, &user, &id).await?))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    Json(input): Json<CommentInput>,
) -> AppResult<(StatusCode, Json<TaskComment>)> {
    let comment = tasks::add_comment(&state.db, &user, &id, input).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_labels(State(state): State<AppState>) -> AppResult<Json<Vec<Label>>> {
    Ok(Json(tasks::list_labels(&state.db).await?))
}
