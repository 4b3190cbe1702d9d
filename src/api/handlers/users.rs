//! Team administration handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::api::AppState;
use crate::commands::users;
use crate::error::AppResult;
use crate::models::{
    ChangePasswordRequest, CreateUserRequest, SessionUser, UpdateUserRequest, User, UserProfile,
};

pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(users::list_users(&state.db).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(actor): Extension<SessionUser>,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = users::create_user(&state.db, &actor, req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<UserProfile>> {
    Ok(Json(users::get_profile(&state.db, &id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(actor): Extension<SessionUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    Ok(Json(users::update_user(&state.db, &actor, &id, req).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(actor): Extension<SessionUser>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    users::delete_user(&state.db, &actor, &id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(actor): Extension<SessionUser>,
    Path(id): Path<String>,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    users::change_password(&state.db, &actor, &id, req).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
