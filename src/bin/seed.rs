//! Wipe the configured database and load demo data
//!
//! Usage:
//!   DATABASE_URL=sqlite://alphacore.db?mode=rwc ./alphacore-seed

use alphacore::{
    commands::seed::{seed_demo_data, SEED_PASSWORD},
    config::AppConfig,
    db::Database,
    logging,
};
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init_logging(&config);

    let db = match Database::connect(&config.database_url, config.database_max_connections).await {
        Ok(db) => db,
        Err(e) => {
            error!("Database unavailable: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match seed_demo_data(&db).await {
        Ok(emails) => {
            for (i, email) in emails.iter().enumerate() {
                info!("User {}: {} / {}", i + 1, email, SEED_PASSWORD);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Seed failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
