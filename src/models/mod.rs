//! API and storage types
//!
//! Wire types serialise as camelCase (the dashboard frontend's convention)
//! and enums as SCREAMING_SNAKE_CASE, which is also how they are stored.
//! TypeScript bindings are exported with ts-rs.

mod activity;
mod finance;
mod project;
mod report;
mod user;

pub use activity::*;
pub use finance::*;
pub use project::*;
pub use report::*;
pub use user::*;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::constants::MAX_PAGE_LIMIT;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// Clamp raw paging parameters, returning `(page, limit, offset)`
pub fn page_bounds(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_LIMIT);
    (page, limit, (page - 1) * limit)
}
