use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use ts_rs::TS;

use super::UserSummary;

/// One audit-trail entry
#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct ActivityLog {
    pub id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub user_id: String,
    pub user: Option<UserSummary>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Columns expected by `ActivityLog::from_row`
pub const ACTIVITY_COLUMNS: &str = "l.id, l.action, l.entity_type, l.entity_id, l.user_id, \
     l.metadata, l.created_at, u.id AS actor_id, u.name AS actor_name, u.email AS actor_email";

impl<'r> FromRow<'r, SqliteRow> for ActivityLog {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let metadata: Option<String> = row.try_get("metadata")?;
        let metadata = metadata
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Self {
            id: row.try_get("id")?,
            action: row.try_get("action")?,
            entity_type: row.try_get("entity_type")?,
            entity_id: row.try_get("entity_id")?,
            user_id: row.try_get("user_id")?,
            user: UserSummary::from_prefixed(row, "actor")?,
            metadata,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFilter {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub entity_type: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, TS)]
#[ts(export, export_to = "models/")]
pub struct ActivityPage {
    pub data: Vec<ActivityLog>,
    pub pagination: super::Pagination,
}
