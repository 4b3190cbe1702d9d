use chrono::Utc;

use crate::constants::{MSG_CATEGORY_IN_USE, MSG_CATEGORY_NOT_FOUND};
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{Category, CategoryInput, TransactionType};
use crate::validation;

const CATEGORY_COLUMNS: &str = "id, name, type, color, icon, created_at";

pub async fn list_categories(db: &Database, kind: Option<TransactionType>) -> AppResult<Vec<Category>> {
    let categories = match kind {
        Some(kind) => {
            sqlx::query_as::<_, Category>(&format!(
                "SELECT {} FROM categories WHERE type = ? ORDER BY created_at DESC",
                CATEGORY_COLUMNS
            ))
            .bind(kind)
            .fetch_all(db.pool())
            .await?
        }
        None => {
            sqlx::query_as::<_, Category>(&format!(
                "SELECT {} FROM categories ORDER BY created_at DESC",
                CATEGORY_COLUMNS
            ))
            .fetch_all(db.pool())
            .await?
        }
    };
    Ok(categories)
}

pub async fn find_category(db: &Database, id: &str) -> AppResult<Option<Category>> {
    let category = sqlx::query_as::<_, Category>(&format!(
        "SELECT {} FROM categories WHERE id = ?",
        CATEGORY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db.pool())
    .await?;
    Ok(category)
}

pub async fn get_category(db: &Database, id: &str) -> AppResult<Category> {
    find_category(db, id)
        .await?
        .ok_or_else(|| AppError::not_found(MSG_CATEGORY_NOT_FOUND))
}

pub async fn create_category(db: &Database, input: CategoryInput) -> AppResult<Category> {
    validation::validate_category(&input)?;

    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO categories (id, name, type, color, icon, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(input.name.trim())
    .bind(input.kind)
    .bind(&input.color)
    .bind(input.icon.as_deref().filter(|i| !i.is_empty()))
    .bind(Utc::now())
    .execute(db.pool())
    .await?;

    get_category(db, &id).await
}

pub async fn update_category(db: &Database, id: &str, input: CategoryInput) -> AppResult<Category> {
    get_category(db, id).await?;
    validation::validate_category(&input)?;

    sqlx::query("UPDATE categories SET name = ?, type = ?, color = ?, icon = ? WHERE id = ?")
        .bind(input.name.trim())
        .bind(input.kind)
        .bind(&input.color)
        .bind(input.icon.as_deref().filter(|i| !i.is_empty()))
        .bind(id)
        .execute(db.pool())
        .await?;

    get_category(db, id).await
}

/// Delete a category; refused while any transaction still references it
pub async fn delete_category(db: &Database, id: &str) -> AppResult<()> {
    get_category(db, id).await?;

    let in_use: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE category_id = ?")
        .bind(id)
        .fetch_one(db.pool())
        .await?;
    if in_use > 0 {
        return Err(AppError::invalid_params(MSG_CATEGORY_IN_USE));
    }

    sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(db.pool())
        .await?;
    Ok(())
}
