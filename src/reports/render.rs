use serde_json::Value;
use std::collections::HashMap;
use tera::{Context, Tera};

use super::aggregate::{PeriodReport, ReportData};
use super::format::{format_change, format_currency, format_date, format_long_date, format_month};
use crate::error::{AppError, AppResult};
use crate::models::ReportFrequency;

const TEMPLATES: [(&str, &str); 5] = [
    ("base.html", include_str!("../../templates/emails/base.html")),
    ("summary.html", include_str!("../../templates/emails/summary.html")),
    ("daily.html", include_str!("../../templates/emails/daily.html")),
    ("weekly.html", include_str!("../../templates/emails/weekly.html")),
    ("monthly.html", include_str!("../../templates/emails/monthly.html")),
];

#[derive(Clone, Debug)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

fn currency_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let amount = value
        .as_f64()
        .ok_or_else(|| tera::Error::msg(format!("currency filter expects a number, got {}", value)))?;
    Ok(Value::String(format_currency(amount)))
}

pub fn subject(frequency: ReportFrequency, data: &ReportData) -> String {
    let window = data.window();
    match frequency {
        ReportFrequency::Daily => format!("Günlük Rapor - {}", format_date(window.first_day)),
        ReportFrequency::Weekly => format!(
            "Haftalık Rapor - {} - {}",
            format_date(window.first_day),
            format_date(window.last_day)
        ),
        ReportFrequency::Monthly => format!("Aylık Rapor - {}", format_month(window.first_day)),
    }
}

/// Renders report emails from the embedded Tera templates
pub struct ReportRenderer {
    tera: Tera,
}

impl ReportRenderer {
    pub fn new() -> AppResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.to_vec())?;
        tera.register_filter("currency", currency_filter);
        Ok(Self { tera })
    }

    pub fn render(&self, frequency: ReportFrequency, data: &ReportData) -> AppResult<RenderedEmail> {
        let mut context = Context::new();
        context.insert("report", data);

        let template = match (frequency, data) {
            (ReportFrequency::Daily, ReportData::Daily(report)) => {
                context.insert("date_label", &format_long_date(report.date));
                "daily.html"
            }
            (ReportFrequency::Weekly, ReportData::Period(report)) => {
                insert_period(&mut context, report);
                "weekly.html"
            }
            (ReportFrequency::Monthly, ReportData::Period(report)) => {
                insert_period(&mut context, report);
                context.insert("month_label", &format_month(report.window.first_day));
                context.insert("change_label", &report.change_percent.map(format_change));
                context.insert("net_abs", &report.financial_summary.net.abs());
                context.insert("open_tasks", &(report.task_statistics.total - report.task_statistics.completed));
                "monthly.html"
            }
            _ => {
                return Err(AppError::template(format!(
                    "{} report data does not match its template",
                    frequency.slug()
                )))
            }
        };

        Ok(RenderedEmail {
            subject: subject(frequency, data),
            html: self.tera.render(template, &context)?,
        })
    }
}

fn insert_period(context: &mut Context, report: &PeriodReport) {
    context.insert(
        "period_label",
        &format!(
            "{} - {}",
            format_long_date(report.window.first_day),
            format_long_date(report.window.last_day)
        ),
    );
    context.insert("pending", &report.task_statistics.pending());
    context.insert("completion_rate", &report.task_statistics.completion_rate());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryRef, Transaction, TransactionType};
    use crate::reports::aggregate::{CategorySpend, DailyReport, FinancialSummary, TaskStatistics};
    use crate::reports::period::ReportWindow;
    use chrono::{FixedOffset, NaiveDate, Utc};

    fn tr() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn daily() -> ReportData {
        let window = ReportWindow::days(day(2025, 3, 5), day(2025, 3, 6), tr());
        let transaction = Transaction {
            id: "t1".to_string(),
            kind: TransactionType::Expense,
            amount: 1234.5,
            description: "Ofis <kira>".to_string(),
            date: Utc::now(),
            category_id: "c1".to_string(),
            user_id: "u1".to_string(),
            category: CategoryRef {
                id: "c1".to_string(),
                name: "Kira".to_string(),
                color: "#ef4444".to_string(),
                icon: None,
            },
            user: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        ReportData::Daily(DailyReport {
            date: window.first_day,
            window,
            summary: FinancialSummary::from_transactions(std::slice::from_ref(&transaction)),
            transactions: vec![transaction],
            completed_tasks_count: 2,
        })
    }

    fn monthly(previous: Option<f64>, change: Option<f64>) -> ReportData {
        ReportData::Period(PeriodReport {
            window: ReportWindow::month(2025, 2, tr()),
            financial_summary: FinancialSummary {
                income: 5000.0,
                expense: 6000.0,
                net: -1000.0,
            },
            task_statistics: TaskStatistics {
                completed: 1,
                in_progress: 1,
                total: 4,
            },
            top_categories: vec![CategorySpend {
                name: "Maaş".to_string(),
                amount: 4000.0,
            }],
            transactions_count: 7,
            previous_window: Some(ReportWindow::month(2025, 1, tr())),
            previous_month_net: previous,
            change_percent: change,
        })
    }

    #[test]
    fn subjects_follow_frequency() {
        assert_eq!(subject(ReportFrequency::Daily, &daily()), "Günlük Rapor - 05.03.2025");
        assert_eq!(subject(ReportFrequency::Monthly, &monthly(None, None)), "Aylık Rapor - Şubat 2025");

        let weekly = ReportData::Period(PeriodReport {
            window: ReportWindow::days(day(2025, 2, 24), day(2025, 3, 3), tr()),
            financial_summary: FinancialSummary::default(),
            task_statistics: TaskStatistics::default(),
            top_categories: Vec::new(),
            transactions_count: 0,
            previous_window: None,
            previous_month_net: None,
            change_percent: None,
        });
        assert_eq!(
            subject(ReportFrequency::Weekly, &weekly),
            "Haftalık Rapor - 24.02.2025 - 02.03.2025"
        );
        let email = ReportRenderer::new().unwrap().render(ReportFrequency::Weekly, &weekly).unwrap();
        assert!(email.html.contains("Bu hafta hiç gider kategorisi yok."));
    }

    #[test]
    fn daily_email_lists_transactions_escaped() {
        let email = ReportRenderer::new().unwrap().render(ReportFrequency::Daily, &daily()).unwrap();
        assert!(email.html.contains("5 Mart 2025"));
        assert!(email.html.contains("-₺1.234,50"));
        assert!(email.html.contains("Ofis &lt;kira&gt;"));
        assert!(email.html.contains("<strong>2</strong> görev tamamlandı"));
    }

    #[test]
    fn monthly_email_shows_change_only_when_known() {
        let renderer = ReportRenderer::new().unwrap();

        let with_change = renderer
            .render(ReportFrequency::Monthly, &monthly(Some(-2000.0), Some(50.0)))
            .unwrap();
        assert!(with_change.html.contains("+50.0%"));
        assert!(with_change.html.contains("₺1.000,00 negatif bakiyeye"));
        assert!(with_change.html.contains("Maaş"));
        assert!(with_change.html.contains("25%"));

        let without = renderer.render(ReportFrequency::Monthly, &monthly(None, None)).unwrap();
        assert!(!without.html.contains("Geçen aya göre"));
    }

    #[test]
    fn mismatched_data_is_a_template_error() {
        let err = ReportRenderer::new()
            .unwrap()
            .render(ReportFrequency::Weekly, &daily())
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::TemplateError);
    }
}
