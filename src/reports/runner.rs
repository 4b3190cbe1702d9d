//! Report runs: pick frequencies, aggregate, fan out emails, record the run

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use ts_rs::TS;

use super::aggregate::{build_report, ReportData};
use super::mailer::{Mailer, OutgoingEmail};
use super::period::{frequencies_for, local_today, manual_window, scheduled_window, ReportWindow};
use super::render::{RenderedEmail, ReportRenderer};
use crate::commands::activity::log_activity_quietly;
use crate::commands::reports::{active_schedules, mark_run};
use crate::config::AppConfig;
use crate::constants::MSG_NO_SCHEDULES;
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{ReportFrequency, ReportSchedule};

#[derive(Clone, Debug, Serialize, PartialEq, TS)]
#[ts(export, export_to = "models/")]
pub struct EmailResult {
    pub recipient: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmailResult {
    fn sent(recipient: &str) -> Self {
        Self {
            recipient: recipient.to_string(),
            success: true,
            error: None,
        }
    }

    fn failed(recipient: &str, error: impl Into<String>) -> Self {
        Self {
            recipient: recipient.to_string(),
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct FrequencyResult {
    pub schedules_processed: usize,
    pub email_results: Vec<EmailResult>,
}

impl FrequencyResult {
    pub fn emails_sent(&self) -> usize {
        self.email_results.iter().filter(|r| r.success).count()
    }

    pub fn emails_failed(&self) -> usize {
        self.email_results.len() - self.emails_sent()
    }
}

#[derive(Clone, Debug, Default, Serialize, TS)]
#[ts(export, export_to = "models/")]
pub struct RunResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily: Option<FrequencyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly: Option<FrequencyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly: Option<FrequencyResult>,
}

impl RunResults {
    fn set(&mut self, frequency: ReportFrequency, result: FrequencyResult) {
        match frequency {
            ReportFrequency::Daily => self.daily = Some(result),
            ReportFrequency::Weekly => self.weekly = Some(result),
            ReportFrequency::Monthly => self.monthly = Some(result),
        }
    }
}

/// Nothing due today had an active schedule
#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct IdleRun {
    pub success: bool,
    pub message: String,
    pub frequencies_checked: Vec<ReportFrequency>,
}

#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct CompletedRun {
    pub success: bool,
    pub frequencies_run: Vec<ReportFrequency>,
    pub results: RunResults,
}

#[derive(Clone, Debug, Serialize, TS)]
#[serde(untagged)]
#[ts(export, export_to = "models/")]
pub enum ScheduledRun {
    Idle(IdleRun),
    Completed(CompletedRun),
}

/// Result of a manual, period-to-date run of one frequency
#[derive(Clone, Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct ManualRun {
    pub success: bool,
    pub frequency: ReportFrequency,
    pub report_data: ReportData,
    pub schedules_processed: usize,
    pub email_results: Vec<EmailResult>,
}

/// Runs reports against the store and delivers them through a `Mailer`
#[derive(Clone)]
pub struct ReportService {
    db: Database,
    mailer: Arc<dyn Mailer>,
    from: String,
    offset: FixedOffset,
    /// Serializes runs so the scheduler and the cron endpoint never interleave
    run_lock: Arc<Mutex<()>>,
}

impl ReportService {
    pub fn new(db: Database, mailer: Arc<dyn Mailer>, config: &AppConfig) -> Self {
        Self {
            db,
            mailer,
            from: config.email.from.clone(),
            offset: config.reports.offset(),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Run every frequency due on the local day of `now`
    pub async fn run_scheduled(&self, now: DateTime<Utc>) -> AppResult<ScheduledRun> {
        let _guard = self.run_lock.lock().await;

        let today = local_today(now, self.offset);
        let due = frequencies_for(today);

        let mut batches = Vec::new();
        for frequency in &due {
            let schedules = active_schedules(&self.db, *frequency).await?;
            if !schedules.is_empty() {
                batches.push((*frequency, schedules));
            }
        }

        if batches.is_empty() {
            info!("[Reports] No active schedules for {:?} on {}", due, today);
            return Ok(ScheduledRun::Idle(IdleRun {
                success: true,
                message: MSG_NO_SCHEDULES.to_string(),
                frequencies_checked: due,
            }));
        }

        let renderer = ReportRenderer::new()?;
        let mut results = RunResults::default();
        for (frequency, schedules) in batches {
            let window = scheduled_window(frequency, today, self.offset);
            let (_, result) = self.run_frequency(&renderer, frequency, window, &schedules).await?;
            results.set(frequency, result);
        }

        Ok(ScheduledRun::Completed(CompletedRun {
            success: true,
            frequencies_run: due,
            results,
        }))
    }

    /// Period-to-date run of one frequency regardless of the calendar day
    pub async fn run_manual(&self, frequency: ReportFrequency, now: DateTime<Utc>) -> AppResult<ManualRun> {
        let _guard = self.run_lock.lock().await;

        let window = manual_window(frequency, local_today(now, self.offset), self.offset);
        let schedules = active_schedules(&self.db, frequency).await?;
        let renderer = ReportRenderer::new()?;
        let (report_data, result) = self.run_frequency(&renderer, frequency, window, &schedules).await?;

        Ok(ManualRun {
            success: true,
            frequency,
            report_data,
            schedules_processed: result.schedules_processed,
            email_results: result.email_results,
        })
    }

    async fn run_frequency(
        &self,
        renderer: &ReportRenderer,
        frequency: ReportFrequency,
        window: ReportWindow,
        schedules: &[ReportSchedule],
    ) -> AppResult<(ReportData, FrequencyResult)> {
        let data = build_report(&self.db, frequency, window, self.offset).await?;
        let rendered = renderer.render(frequency, &data);

        let email_results = self.send_emails(schedules, &rendered).await?;
        let result = FrequencyResult {
            schedules_processed: schedules.len(),
            email_results,
        };

        info!(
            "[Reports] {} report {} → {}: {} sent, {} failed",
            frequency.slug(),
            window.first_day,
            window.last_day,
            result.emails_sent(),
            result.emails_failed()
        );

        if let Some(first) = schedules.first() {
            let metadata = activity_metadata(frequency, &data, &result);
            log_activity_quietly(
                &self.db,
                "generated",
                "report",
                &format!("{}-report", frequency.slug()),
                &first.user_id,
                Some(metadata),
            )
            .await;
        }

        Ok((data, result))
    }

    /// One send per recipient, in order; a failure is recorded and the loop
    /// moves on. Each schedule is stamped once its recipients are processed.
    async fn send_emails(
        &self,
        schedules: &[ReportSchedule],
        rendered: &AppResult<RenderedEmail>,
    ) -> AppResult<Vec<EmailResult>> {
        let mut results = Vec::new();

        for schedule in schedules {
            for recipient in &schedule.recipients {
                let outcome = match rendered {
                    Ok(email) => {
                        let message = OutgoingEmail {
                            from: self.from.clone(),
                            to: recipient.clone(),
                            subject: email.subject.clone(),
                            html: email.html.clone(),
                        };
                        self.mailer.send(&message).await.map_err(|e| e.to_string())
                    }
                    Err(e) => Err(e.to_string()),
                };

                match outcome {
                    Ok(()) => results.push(EmailResult::sent(recipient)),
                    Err(e) => {
                        warn!("[Reports] Failed to send email to {}: {}", recipient, e);
                        results.push(EmailResult::failed(recipient, e));
                    }
                }
            }

            mark_run(&self.db, &schedule.id, Utc::now()).await?;
        }

        Ok(results)
    }
}

fn activity_metadata(frequency: ReportFrequency, data: &ReportData, result: &FrequencyResult) -> Value {
    let window = data.window();
    let mut metadata = json!({
        "reportType": frequency.slug(),
        "transactionsCount": data.transactions_count(),
        "emailsSent": result.emails_sent(),
        "emailsFailed": result.emails_failed(),
    });

    let Some(fields) = metadata.as_object_mut() else {
        return metadata;
    };
    match data {
        ReportData::Daily(report) => {
            fields.insert("date".to_string(), json!(window.start.to_rfc3339()));
            fields.insert("completedTasksCount".to_string(), json!(report.completed_tasks_count));
        }
        ReportData::Period(report) => {
            let (start_key, end_key) = if frequency == ReportFrequency::Monthly {
                ("monthStart", "monthEnd")
            } else {
                ("weekStart", "weekEnd")
            };
            fields.insert(start_key.to_string(), json!(window.start.to_rfc3339()));
            fields.insert(end_key.to_string(), json!(window.end.to_rfc3339()));
            fields.insert("tasksCompleted".to_string(), json!(report.task_statistics.completed));
        }
    }
    metadata
}

/// Reject a cron call unless it carries `Bearer <secret>` and a secret is configured
pub fn check_cron_secret(configured: Option<&str>, authorization: Option<&str>) -> AppResult<()> {
    match (configured, authorization) {
        (Some(secret), Some(header)) if header.strip_prefix("Bearer ") == Some(secret) => Ok(()),
        _ => Err(AppError::unauthorized()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::categories::create_category;
    use crate::commands::reports::{create_schedule, get_schedule};
    use crate::commands::testing::admin;
    use crate::commands::transactions::create_transaction;
    use crate::models::{CategoryInput, CreateScheduleRequest, SessionUser, TransactionInput, TransactionType};
    use crate::reports::mailer::RecordingMailer;
    use chrono::TimeZone;

    async fn service(mailer: Arc<RecordingMailer>) -> (ReportService, SessionUser) {
        let db = Database::in_memory().await.unwrap();
        let user = admin(&db).await;
        let config = AppConfig::default();
        (ReportService::new(db, mailer, &config), user)
    }

    async fn schedule(svc: &ReportService, user: &SessionUser, frequency: ReportFrequency, recipients: &[&str]) {
        create_schedule(
            &svc.db,
            user,
            CreateScheduleRequest {
                name: format!("{} rapor", frequency.slug()),
                frequency,
                recipients: recipients.iter().map(|r| r.to_string()).collect(),
                is_active: None,
            },
        )
        .await
        .unwrap();
    }

    async fn spend(svc: &ReportService, user: &SessionUser, kind: TransactionType, amount: f64, at: DateTime<Utc>) {
        let category = create_category(
            &svc.db,
            CategoryInput {
                name: format!("{:?}-{}", kind, amount),
                kind,
                color: "#10b981".to_string(),
                icon: None,
            },
        )
        .await
        .unwrap();
        create_transaction(
            &svc.db,
            user,
            TransactionInput {
                kind,
                amount,
                description: "test".to_string(),
                date: at,
                category_id: category.id,
            },
        )
        .await
        .unwrap();
    }

    // 2025-03-05 09:00 in UTC+3, a Wednesday
    fn wednesday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 5, 6, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn idle_when_no_schedule_is_due() {
        let mailer = Arc::new(RecordingMailer::new());
        let (svc, user) = service(mailer.clone()).await;
        // Weekly schedules are not due on a Wednesday
        schedule(&svc, &user, ReportFrequency::Weekly, &["a@example.com"]).await;

        match svc.run_scheduled(wednesday()).await.unwrap() {
            ScheduledRun::Idle(idle) => {
                assert_eq!(idle.message, "No active schedules to run");
                assert_eq!(idle.frequencies_checked, vec![ReportFrequency::Daily]);
            }
            other => panic!("expected idle run, got {:?}", other),
        }
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn one_failed_recipient_does_not_stop_the_rest() {
        let mailer = Arc::new(RecordingMailer::failing_for(["bounce@example.com"]));
        let (svc, user) = service(mailer.clone()).await;
        schedule(
            &svc,
            &user,
            ReportFrequency::Daily,
            &["first@example.com", "bounce@example.com", "last@example.com"],
        )
        .await;
        spend(&svc, &user, TransactionType::Income, 500.0, wednesday()).await;

        let run = match svc.run_scheduled(wednesday()).await.unwrap() {
            ScheduledRun::Completed(run) => run,
            other => panic!("expected completed run, got {:?}", other),
        };
        let daily = run.results.daily.unwrap();
        assert_eq!(daily.schedules_processed, 1);
        let outcomes: Vec<(&str, bool)> = daily
            .email_results
            .iter()
            .map(|r| (r.recipient.as_str(), r.success))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                ("first@example.com", true),
                ("bounce@example.com", false),
                ("last@example.com", true)
            ]
        );
        assert!(daily.email_results[1].error.as_deref().unwrap().contains("422"));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, "Günlük Rapor - 05.03.2025");
        assert!(sent[0].html.contains("₺500,00"));

        let schedules = active_schedules(&svc.db, ReportFrequency::Daily).await.unwrap();
        assert!(get_schedule(&svc.db, &schedules[0].id).await.unwrap().last_run_at.is_some());
    }

    #[tokio::test]
    async fn run_is_logged_against_first_schedule_owner() {
        let mailer = Arc::new(RecordingMailer::failing_for(["b@example.com"]));
        let (svc, user) = service(mailer).await;
        schedule(&svc, &user, ReportFrequency::Daily, &["a@example.com", "b@example.com"]).await;

        svc.run_scheduled(wednesday()).await.unwrap();

        let log = crate::commands::activity::recent_activity(&svc.db, 1).await.unwrap();
        assert_eq!(log[0].action, "generated");
        assert_eq!(log[0].entity_type, "report");
        assert_eq!(log[0].entity_id, "daily-report");
        assert_eq!(log[0].user.as_ref().unwrap().id, user.id);
        let metadata = log[0].metadata.as_ref().unwrap();
        assert_eq!(metadata["emailsSent"], 1);
        assert_eq!(metadata["emailsFailed"], 1);
        assert_eq!(metadata["reportType"], "daily");
    }

    #[tokio::test]
    async fn monthly_on_the_first_compares_previous_months() {
        let mailer = Arc::new(RecordingMailer::new());
        let (svc, user) = service(mailer.clone()).await;
        schedule(&svc, &user, ReportFrequency::Monthly, &["cfo@example.com"]).await;

        // February net +300, January net +200
        spend(&svc, &user, TransactionType::Income, 400.0, Utc.with_ymd_and_hms(2025, 2, 10, 9, 0, 0).unwrap()).await;
        spend(&svc, &user, TransactionType::Expense, 100.0, Utc.with_ymd_and_hms(2025, 2, 11, 9, 0, 0).unwrap()).await;
        spend(&svc, &user, TransactionType::Income, 200.0, Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap()).await;
        // March 1st local time, outside February
        spend(&svc, &user, TransactionType::Income, 999.0, Utc.with_ymd_and_hms(2025, 2, 28, 21, 0, 0).unwrap()).await;

        // 2025-03-01 is a Saturday
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let run = match svc.run_scheduled(now).await.unwrap() {
            ScheduledRun::Completed(run) => run,
            other => panic!("expected completed run, got {:?}", other),
        };
        assert_eq!(run.frequencies_run, vec![ReportFrequency::Daily, ReportFrequency::Monthly]);
        assert!(run.results.daily.is_none());
        assert_eq!(run.results.monthly.unwrap().email_results.len(), 1);

        let sent = mailer.sent();
        assert_eq!(sent[0].subject, "Aylık Rapor - Şubat 2025");
        assert!(sent[0].html.contains("+50.0%"));

        let manual = svc.run_manual(ReportFrequency::Monthly, now).await.unwrap();
        match manual.report_data {
            ReportData::Period(report) => {
                assert_eq!(report.financial_summary.income, 999.0);
                assert_eq!(report.previous_month_net, Some(300.0));
            }
            other => panic!("expected period report, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn manual_run_without_schedules_still_reports() {
        let mailer = Arc::new(RecordingMailer::new());
        let (svc, _user) = service(mailer).await;
        let run = svc.run_manual(ReportFrequency::Weekly, wednesday()).await.unwrap();
        assert!(run.success);
        assert_eq!(run.schedules_processed, 0);
        assert!(run.email_results.is_empty());
        assert_eq!(run.report_data.window().first_day.to_string(), "2025-03-03");
    }

    #[test]
    fn cron_secret_must_match() {
        assert!(check_cron_secret(Some("s3cret"), Some("Bearer s3cret")).is_ok());
        assert!(check_cron_secret(Some("s3cret"), Some("Bearer wrong")).is_err());
        assert!(check_cron_secret(Some("s3cret"), None).is_err());
        assert!(check_cron_secret(None, Some("Bearer ")).is_err());
        assert!(check_cron_secret(Some("s3cret"), Some("s3cret")).is_err());
    }
}
