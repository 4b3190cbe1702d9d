use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use ts_rs::TS;

use super::UserSummary;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "models/")]
pub enum TransactionType {
    Income,
    Expense,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub color: String,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Category {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            kind: row.try_get("type")?,
            color: row.try_get("color")?,
            icon: row.try_get("icon")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Category fields embedded in a transaction
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct CategoryRef {
    pub id: String,
    pub name: String,
    pub color: String,
    pub icon: Option<String>,
}

#[derive(Clone, Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct CategoryInput {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub color: String,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    pub description: String,
    pub date: DateTime<Utc>,
    pub category_id: String,
    pub user_id: String,
    pub category: CategoryRef,
    /// Present when listed for reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns expected by `Transaction::from_row`
pub const TRANSACTION_COLUMNS: &str = "t.id, t.type, t.amount, t.description, t.date, \
     t.category_id, t.user_id, t.created_at, t.updated_at, \
     c.name AS category_name, c.color AS category_color, c.icon AS category_icon, \
     u.id AS owner_id, u.name AS owner_name, u.email AS owner_email";

/// Join clause matching `TRANSACTION_COLUMNS`
pub const TRANSACTION_FROM: &str = "FROM transactions t \
     JOIN categories c ON c.id = t.category_id \
     JOIN users u ON u.id = t.user_id";

impl<'r> FromRow<'r, SqliteRow> for Transaction {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let category_id: String = row.try_get("category_id")?;
        Ok(Self {
            id: row.try_get("id")?,
            kind: row.try_get("type")?,
            amount: row.try_get("amount")?,
            description: row.try_get("description")?,
            date: row.try_get("date")?,
            category: CategoryRef {
                id: category_id.clone(),
                name: row.try_get("category_name")?,
                color: row.try_get("category_color")?,
                icon: row.try_get("category_icon")?,
            },
            category_id,
            user_id: row.try_get("user_id")?,
            user: UserSummary::from_prefixed(row, "owner")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Clone, Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct TransactionInput {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    pub description: String,
    pub date: DateTime<Utc>,
    pub category_id: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    pub category_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Clone, Debug, Serialize, TS)]
#[ts(export, export_to = "models/")]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub pagination: super::Pagination,
}

// ========================
// Invoices
// ========================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "models/")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct InvoiceItem {
    pub id: String,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

impl InvoiceItem {
    pub fn line_total(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

impl<'r> FromRow<'r, SqliteRow> for InvoiceItem {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            description: row.try_get("description")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct Invoice {
    pub id: String,
    pub number: String,
    pub status: InvoiceStatus,
    pub client_name: String,
    pub client_email: Option<String>,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub user_id: String,
    pub items: Vec<InvoiceItem>,
    pub total: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Invoice {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            number: row.try_get("number")?,
            status: row.try_get("status")?,
            client_name: row.try_get("client_name")?,
            client_email: row.try_get("client_email")?,
            issue_date: row.try_get("issue_date")?,
            due_date: row.try_get("due_date")?,
            notes: row.try_get("notes")?,
            user_id: row.try_get("user_id")?,
            items: Vec::new(),
            total: 0.0,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Invoice {
    /// Attach items and recompute the total
    pub fn with_items(mut self, items: Vec<InvoiceItem>) -> Self {
        self.total = items.iter().map(InvoiceItem::line_total).sum();
        self.items = items;
        self
    }
}

#[derive(Clone, Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct InvoiceItemInput {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

#[derive(Clone, Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct InvoiceInput {
    pub client_name: String,
    #[serde(default)]
    pub client_email: Option<String>,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<InvoiceItemInput>,
    /// Ignored on create
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
}
