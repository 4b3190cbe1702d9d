//! Domain operations behind the HTTP handlers
//!
//! Every function takes the store plus the calling session user (where the
//! operation is access-checked) and returns `AppResult`, so handlers only
//! translate between HTTP and these calls.

pub mod activity;
pub mod categories;
pub mod dashboard;
pub mod invoices;
pub mod members;
pub mod projects;
pub mod reports;
pub mod seed;
pub mod tasks;
pub mod transactions;
pub mod users;
