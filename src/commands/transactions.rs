use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};

use super::categories::find_category;
use crate::constants::{MSG_CATEGORY_NOT_FOUND, TRANSACTIONS_PAGE_LIMIT};
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{
    page_bounds, Pagination, SessionUser, Transaction, TransactionFilter, TransactionInput,
    TransactionPage, TRANSACTION_COLUMNS, TRANSACTION_FROM,
};
use crate::validation;

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, owner: &'a str, filter: &'a TransactionFilter) {
    qb.push(" WHERE t.user_id = ").push_bind(owner);
    if let Some(kind) = filter.kind {
        qb.push(" AND t.type = ").push_bind(kind);
    }
    if let Some(category_id) = filter.category_id.as_deref().filter(|c| !c.is_empty()) {
        qb.push(" AND t.category_id = ").push_bind(category_id);
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND t.date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND t.date <= ").push_bind(end);
    }
}

/// The caller's own transactions, newest date first
pub async fn list_transactions(
    db: &Database,
    user: &SessionUser,
    filter: &TransactionFilter,
) -> AppResult<TransactionPage> {
    let (page, limit, offset) = page_bounds(filter.page, filter.limit, TRANSACTIONS_PAGE_LIMIT);

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM transactions t");
    push_filters(&mut count, &user.id, filter);
    let total: i64 = count.build_query_scalar().fetch_one(db.pool()).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} {}", TRANSACTION_COLUMNS, TRANSACTION_FROM));
    push_filters(&mut qb, &user.id, filter);
    qb.push(" ORDER BY t.date DESC, t.created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let transactions = qb.build_query_as::<Transaction>().fetch_all(db.pool()).await?;

    Ok(TransactionPage {
        transactions,
        pagination: Pagination::new(total, page, limit),
    })
}

async fn find_owned(db: &Database, user: &SessionUser, id: &str) -> AppResult<Option<Transaction>> {
    let tx = sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {} {} WHERE t.id = ? AND t.user_id = ?",
        TRANSACTION_COLUMNS, TRANSACTION_FROM
    ))
    .bind(id)
    .bind(&user.id)
    .fetch_optional(db.pool())
    .await?;
    Ok(tx)
}

pub async fn get_transaction(db: &Database, user: &SessionUser, id: &str) -> AppResult<Transaction> {
    find_owned(db, user, id).await?.ok_or_else(AppError::record_not_found)
}

async fn check_input(db: &Database, input: &TransactionInput) -> AppResult<()> {
    validation::validate_transaction(input)?;
    if find_category(db, &input.category_id).await?.is_none() {
        return Err(AppError::invalid_params(MSG_CATEGORY_NOT_FOUND));
    }
    Ok(())
}

pub async fn create_transaction(
    db: &Database,
    user: &SessionUser,
    input: TransactionInput,
) -> AppResult<Transaction> {
    check_input(db, &input).await?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO transactions (id, type, amount, description, date, category_id, user_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(input.kind)
    .bind(input.amount)
    .bind(input.description.trim())
    .bind(input.date)
    .bind(&input.category_id)
    .bind(&user.id)
    .bind(now)
    .bind(now)
    .execute(db.pool())
    .await?;

    get_transaction(db, user, &id).await
}

pub async fn update_transaction(
    db: &Database,
    user: &SessionUser,
    id: &str,
    input: TransactionInput,
) -> AppResult<Transaction> {
    get_transaction(db, user, id).await?;
    check_input(db, &input).await?;

    sqlx::query(
        "UPDATE transactions SET type = ?, amount = ?, description = ?, date = ?, category_id = ?, updated_at = ? \
         WHERE id = ? AND user_id = ?",
    )
    .bind(input.kind)
    .bind(input.amount)
    .bind(input.description.trim())
    .bind(input.date)
    .bind(&input.category_id)
    .bind(Utc::now())
    .bind(id)
    .bind(&user.id)
    .execute(db.pool())
    .await?;

    get_transaction(db, user, id).await
}

pub async fn delete_transaction(db: &Database, user: &SessionUser, id: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM transactions WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(&user.id)
        .execute(db.pool())
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::record_not_found());
    }
    Ok(())
}
