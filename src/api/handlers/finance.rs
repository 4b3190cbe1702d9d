//! Categories, transactions and invoices

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::AppState;
use crate::commands::{categories, invoices, transactions};
use crate::error::AppResult;
use crate::models::{
    Category, CategoryInput, Invoice, InvoiceInput, InvoiceStatus, SessionUser, Transaction,
    TransactionFilter, TransactionInput, TransactionPage, TransactionType,
};

fn deleted() -> Json<Value> {
    Json(json!({ "success": true }))
}

// ========================
// Categories
// ========================

#[derive(Deserialize)]
pub struct CategoryQuery {
    #[serde(rename = "type")]
    kind: Option<TransactionType>,
}

pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(categories::list_categories(&state.db, query.kind).await?))
}

pub async fn get_category(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Category>> {
    Ok(Json(categories::get_category(&state.db, &id).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let category = categories::create_category(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<CategoryInput>,
) -> AppResult<Json<Category>> {
    Ok(Json(categories::update_category(&state.db, &id, input).await?))
}

pub async fn delete_category(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    categories::delete_category(&state.db, &id).await?;
    Ok(deleted())
}

// ========================
// Transactions
// ========================

pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Query(filter): Query<TransactionFilter>,
) -> AppResult<Json<TransactionPage>> {
    Ok(Json(transactions::list_transactions(&state.db, &user, &filter).await?))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Transaction>> {
    Ok(Json(transactions::get_transaction(&state.db, &user, &id).await?))
}

pub async fn create_transaction(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(input): Json<TransactionInput>,
) -> AppResult<(StatusCode, Json<Transaction>)> {
    let transaction = transactions::create_transaction(&state.db, &user, input).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn update_transaction(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    Json(input): Json<TransactionInput>,
) -> AppResult<Json<Transaction>> {
    Ok(Json(transactions::update_transaction(&state.db, &user, &id, input).await?))
}

pub async fn delete_transaction(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    transactions::delete_transaction(&state.db, &user, &id).await?;
    Ok(deleted())
}

// ========================
// Invoices
// ========================

#[derive(Deserialize)]
pub struct InvoiceQuery {
    status: Option<InvoiceStatus>,
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Query(query): Query<InvoiceQuery>,
) -> AppResult<Json<Vec<Invoice>>> {
    Ok(Json(invoices::list_invoices(&state.db, &user, query.status).await?))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(invoices::get_invoice(&state.db, &user, &id).await?))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(input): Json<InvoiceInput>,
) -> AppResult<(StatusCode, Json<Invoice>)> {
    let invoice = invoices::create_invoice(&state.db, &user, input).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    Json(input): Json<InvoiceInput>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(invoices::update_invoice(&state.db, &user, &id, input).await?))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    invoices::delete_invoice(&state.db, &user, &id).await?;
    Ok(deleted())
}
