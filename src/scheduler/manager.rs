use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use ts_rs::TS;

use crate::config::ReportsConfig;
use crate::reports::{ReportService, ScheduledRun};

/// What the scheduler has done so far (in-memory)
#[derive(Clone, Debug, Default)]
pub struct SchedulerState {
    pub running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct SchedulerStatus {
    pub enabled: bool,
    pub running: bool,
    pub cron: String,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Next time `cron_expr` fires strictly after `after`
pub fn next_fire_time(cron_expr: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    cron::Schedule::from_str(cron_expr).ok()?.after(&after).next()
}

pub async fn status(state: &SharedSchedulerState, config: &ReportsConfig, now: DateTime<Utc>) -> SchedulerStatus {
    let state = state.read().await;
    SchedulerStatus {
        enabled: config.scheduler_enabled,
        running: state.running,
        cron: config.cron.clone(),
        next_run_at: state.running.then(|| next_fire_time(&config.cron, now)).flatten(),
        last_run_at: state.last_run_at,
        last_error: state.last_error.clone(),
    }
}

pub struct SchedulerManager {
    scheduler: JobScheduler,
    state: SharedSchedulerState,
}

impl SchedulerManager {
    pub async fn new(state: SharedSchedulerState) -> Result<Self, String> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| format!("Failed to create scheduler: {}", e))?;
        Ok(Self { scheduler, state })
    }

    /// Register the daily report job; it runs whatever is due on each firing
    pub async fn schedule_reports(&self, cron_expr: &str, service: ReportService) -> Result<(), String> {
        let state = self.state.clone();

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let service = service.clone();
            let state = state.clone();

            Box::pin(async move {
                info!("[Scheduler] Triggering scheduled report run");
                let now = Utc::now();
                let outcome = service.run_scheduled(now).await;

                let mut state = state.write().await;
                state.last_run_at = Some(now);
                match outcome {
                    Ok(ScheduledRun::Idle(idle)) => {
                        info!("[Scheduler] Nothing to send ({:?} checked)", idle.frequencies_checked);
                        state.last_error = None;
                    }
                    Ok(ScheduledRun::Completed(run)) => {
                        info!("[Scheduler] Report run finished for {:?}", run.frequencies_run);
                        state.last_error = None;
                    }
                    Err(e) => {
                        error!("[Scheduler] Scheduled report run failed: {}", e);
                        state.last_error = Some(e.message);
                    }
                }
            })
        })
        .map_err(|e| format!("Failed to create job: {}", e))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| format!("Failed to add job to scheduler: {}", e))?;

        info!("[Scheduler] Report job scheduled with cron: {}", cron_expr);
        Ok(())
    }

    pub async fn start(&self) -> Result<(), String> {
        self.scheduler
            .start()
            .await
            .map_err(|e| format!("Failed to start scheduler: {}", e))?;
        self.state.write().await.running = true;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), String> {
        self.state.write().await.running = false;
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| format!("Failed to shutdown scheduler: {}", e))
    }
}

/// Start the report scheduler when enabled; returns `None` when it is switched off
pub async fn start_report_scheduler(
    config: &ReportsConfig,
    service: ReportService,
    state: SharedSchedulerState,
) -> Result<Option<SchedulerManager>, String> {
    if !config.scheduler_enabled {
        info!("[Scheduler] Report scheduler disabled");
        return Ok(None);
    }

    let manager = SchedulerManager::new(state).await?;
    manager.schedule_reports(&config.cron, service).await?;
    manager.start().await?;
    Ok(Some(manager))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_fire_after_now() {
        let now = Utc.with_ymd_and_hms(2025, 3, 5, 9, 30, 0).unwrap();
        assert_eq!(
            next_fire_time("0 0 8 * * *", now),
            Some(Utc.with_ymd_and_hms(2025, 3, 6, 8, 0, 0).unwrap())
        );
        let early = Utc.with_ymd_and_hms(2025, 3, 5, 7, 0, 0).unwrap();
        assert_eq!(
            next_fire_time("0 0 8 * * *", early),
            Some(Utc.with_ymd_and_hms(2025, 3, 5, 8, 0, 0).unwrap())
        );
        assert_eq!(next_fire_time("not a cron", now), None);
    }

    #[tokio::test]
    async fn status_hides_next_run_until_started() {
        let state = SharedSchedulerState::default();
        let config = ReportsConfig::default();
        let now = Utc::now();

        let idle = status(&state, &config, now).await;
        assert!(idle.enabled);
        assert!(!idle.running);
        assert!(idle.next_run_at.is_none());

        state.write().await.running = true;
        let running = status(&state, &config, now).await;
        assert!(running.next_run_at.unwrap() > now);
    }
}
