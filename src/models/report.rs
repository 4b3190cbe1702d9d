use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use ts_rs::TS;

use super::UserSummary;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, sqlx::Type, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "models/")]
pub enum ReportFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl ReportFrequency {
    pub const ALL: [ReportFrequency; 3] = [
        ReportFrequency::Daily,
        ReportFrequency::Weekly,
        ReportFrequency::Monthly,
    ];

    /// Lowercase name used in routes, result keys and activity entity ids
    pub fn slug(self) -> &'static str {
        match self {
            ReportFrequency::Daily => "daily",
            ReportFrequency::Weekly => "weekly",
            ReportFrequency::Monthly => "monthly",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.slug().eq_ignore_ascii_case(slug) || f.as_str() == slug)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportFrequency::Daily => "DAILY",
            ReportFrequency::Weekly => "WEEKLY",
            ReportFrequency::Monthly => "MONTHLY",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct ReportSchedule {
    pub id: String,
    pub name: String,
    pub frequency: ReportFrequency,
    pub recipients: Vec<String>,
    pub is_active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns expected by `ReportSchedule::from_row`
pub const SCHEDULE_COLUMNS: &str = "s.id, s.name, s.frequency, s.recipients, s.is_active, s.last_run_at, \
     s.user_id, s.created_at, s.updated_at, \
     u.id AS owner_id, u.name AS owner_name, u.email AS owner_email";

/// Join clause matching `SCHEDULE_COLUMNS`
pub const SCHEDULE_FROM: &str = "FROM report_schedules s LEFT JOIN users u ON u.id = s.user_id";

impl<'r> FromRow<'r, SqliteRow> for ReportSchedule {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let recipients: String = row.try_get("recipients")?;
        let recipients =
            serde_json::from_str(&recipients).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            frequency: row.try_get("frequency")?,
            recipients,
            is_active: row.try_get("is_active")?,
            last_run_at: row.try_get("last_run_at")?,
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
pub struct CreateScheduleRequest {
    pub name: String,
    pub frequency: ReportFrequency,
    pub recipients: Vec<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Partial update; absent fields are left untouched
#[derive(Clone, Debug, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct UpdateScheduleRequest {
    pub name: Option<String>,
    pub frequency: Option<ReportFrequency>,
    pub recipients: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_round_trip() {
        for f in ReportFrequency::ALL {
            assert_eq!(ReportFrequency::from_slug(f.slug()), Some(f));
        }
        assert_eq!(ReportFrequency::from_slug("WEEKLY"), Some(ReportFrequency::Weekly));
        assert_eq!(ReportFrequency::from_slug("yearly"), None);
    }
}
