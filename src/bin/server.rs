//! Alphacore API server binary
//!
//! Usage:
//!   ALPHACORE_API_HOST=0.0.0.0 ALPHACORE_API_PORT=3030 ./alphacore-server
//!
//! Environment variables (all optional, see `AppConfig`):
//!   - ALPHACORE_CONFIG: YAML config file (default: ./alphacore.yaml)
//!   - DATABASE_URL: SQLite URL
//!   - CRON_SECRET: bearer token for /api/cron/*
//!   - RESEND_API_KEY: enables email delivery
//!   - REPORT_CRON / REPORT_SCHEDULER_ENABLED: in-process report scheduler

use alphacore::{
    api::{self, AppState},
    config::AppConfig,
    db::Database,
    logging,
    reports::{mailer_from_config, ReportService},
    scheduler::{self, SharedSchedulerState},
};
use std::process::ExitCode;
use tracing::{error, info, warn};

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

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), String> {
    info!("Starting Alphacore server...");

    let db = Database::connect(&config.database_url, config.database_max_connections)
        .await
        .map_err(|e| format!("Database unavailable: {}", e))?;

    if config.email.resend_api_key.is_none() {
        warn!("RESEND_API_KEY not set; report emails will fail");
    }
    let mailer = mailer_from_config(&config.email).map_err(|e| e.to_string())?;
    let reports = ReportService::new(db.clone(), mailer, &config);

    let scheduler_state = SharedSchedulerState::default();
    let mut manager = scheduler::start_report_scheduler(&config.reports, reports.clone(), scheduler_state.clone())
        .await
        .map_err(|e| format!("Failed to start report scheduler: {}", e))?;

    let state = AppState::new(db, config, reports, scheduler_state);
    let served = api::start_server(state).await;

    if let Some(manager) = manager.as_mut() {
        if let Err(e) = manager.shutdown().await {
            warn!("[Scheduler] {}", e);
        }
    }
    served
}
