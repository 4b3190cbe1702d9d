use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::constants::{INVOICE_NUMBER_WIDTH, INVOICE_PREFIX, RE_TRAILING_DIGITS};
use crate::db::{Database, StoreError};
use crate::error::{AppError, AppResult};
use crate::models::{Invoice, InvoiceInput, InvoiceItem, InvoiceItemInput, InvoiceStatus, SessionUser};
use crate::permissions::user_filter;
use crate::validation;

const INVOICE_COLUMNS: &str = "id, number, status, client_name, client_email, issue_date, due_date, \
     notes, user_id, created_at, updated_at";

const MSG_INVOICE_NOT_FOUND: &str = "Fatura bulunamadı";
const MSG_NUMBER_TAKEN: &str = "Bu fatura numarası zaten kullanılıyor";

/// Next number after `last`: its trailing digits plus one, zero-padded
pub fn next_invoice_number(last: Option<&str>) -> String {
    let next = last
        .and_then(|n| RE_TRAILING_DIGITS.captures(n))
        .and_then(|caps| caps[1].parse::<u64>().ok())
        .map(|n| n + 1)
        .unwrap_or(1);
    format!("{}{:0width$}", INVOICE_PREFIX, next, width = INVOICE_NUMBER_WIDTH)
}

async fn load_items(db: &Database, invoice_id: &str) -> AppResult<Vec<InvoiceItem>> {
    let items = sqlx::query_as::<_, InvoiceItem>(
        "SELECT id, description, quantity, unit_price FROM invoice_items \
         WHERE invoice_id = ? ORDER BY position",
    )
    .bind(invoice_id)
    .fetch_all(db.pool())
    .await?;
    Ok(items)
}

async fn insert_items(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    items: &[InvoiceItemInput],
) -> AppResult<()> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO invoice_items (id, invoice_id, description, quantity, unit_price, position) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(invoice_id)
        .bind(item.description.trim())
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn list_invoices(
    db: &Database,
    user: &SessionUser,
    status: Option<InvoiceStatus>,
) -> AppResult<Vec<Invoice>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM invoices WHERE 1 = 1", INVOICE_COLUMNS));
    if let Some(owner) = user_filter(user) {
        qb.push(" AND user_id = ").push_bind(owner);
    }
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status);
    }
    qb.push(" ORDER BY created_at DESC");

    let invoices = qb.build_query_as::<Invoice>().fetch_all(db.pool()).await?;

    let mut result = Vec::with_capacity(invoices.len());
    for invoice in invoices {
        let items = load_items(db, &invoice.id).await?;
        result.push(invoice.with_items(items));
    }
    Ok(result)
}

pub async fn get_invoice(db: &Database, user: &SessionUser, id: &str) -> AppResult<Invoice> {
    let invoice = sqlx::query_as::<_, Invoice>(&format!("SELECT {} FROM invoices WHERE id = ?", INVOICE_COLUMNS))
        .bind(id)
        .fetch_optional(db.pool())
        .await?
        .filter(|inv| user_filter(user).map_or(true, |owner| inv.user_id == owner))
        .ok_or_else(|| AppError::not_found(MSG_INVOICE_NOT_FOUND))?;

    let items = load_items(db, &invoice.id).await?;
    Ok(invoice.with_items(items))
}

fn number_conflict(err: sqlx::Error) -> AppError {
    match StoreError::from(err) {
        StoreError::UniqueViolation(detail) => AppError::conflict(MSG_NUMBER_TAKEN).with_details(detail),
        other => other.into(),
    }
}

pub async fn create_invoice(db: &Database, user: &SessionUser, input: InvoiceInput) -> AppResult<Invoice> {
    validation::validate_invoice(&input)?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();

    let mut tx = db.pool().begin().await?;

    let last: Option<String> =
        sqlx::query_scalar("SELECT number FROM invoices ORDER BY created_at DESC, rowid DESC LIMIT 1")
            .fetch_optional(&mut *tx)
            .await?;
    let number = next_invoice_number(last.as_deref());

    sqlx::query(
        "INSERT INTO invoices (id, number, status, client_name, client_email, issue_date, due_date, notes, user_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&number)
    .bind(InvoiceStatus::Draft)
    .bind(input.client_name.trim())
    .bind(input.client_email.as_deref().filter(|e| !e.is_empty()))
    .bind(input.issue_date)
    .bind(input.due_date)
    .bind(input.notes.as_deref().filter(|n| !n.is_empty()))
    .bind(&user.id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(number_conflict)?;

    insert_items(&mut tx, &id, &input.items).await?;
    tx.commit().await?;

    get_invoice(db, user, &id).await
}

/// Update header fields and replace all items
pub async fn update_invoice(
    db: &Database,
    user: &SessionUser,
    id: &str,
    input: InvoiceInput,
) -> AppResult<Invoice> {
    let existing = get_invoice(db, user, id).await?;
    validation::validate_invoice(&input)?;

    let mut tx = db.pool().begin().await?;
    sqlx::query(
        "UPDATE invoices SET status = ?, client_name = ?, client_email = ?, issue_date = ?, due_date = ?, \
         notes = ?, updated_at = ? WHERE id = ?",
    )
    .bind(input.status.unwrap_or(existing.status))
    .bind(input.client_name.trim())
    .bind(input.client_email.as_deref().filter(|e| !e.is_empty()))
    .bind(input.issue_date)
    .bind(input.due_date)
    .bind(input.notes.as_deref().filter(|n| !n.is_empty()))
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    insert_items(&mut tx, id, &input.items).await?;
    tx.commit().await?;

    get_invoice(db, user, id).await
}

pub async fn delete_invoice(db: &Database, user: &SessionUser, id: &str) -> AppResult<()> {
    get_invoice(db, user, id).await?;
    sqlx::query("DELETE FROM invoices WHERE id = ?")
        .bind(id)
        .execute(db.pool())
        .await?;
    Ok(())
}
