//! Calendar logic for report runs
//!
//! Days are judged in the configured report UTC offset and every window is
//! converted to a half-open UTC interval `[start, end)`, so a transaction
//! stamped exactly at a boundary belongs to exactly one window.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc, Weekday};
use serde::Serialize;
use ts_rs::TS;

use crate::models::ReportFrequency;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "models/")]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    /// Exclusive
    pub end: DateTime<Utc>,
    /// First local day covered
    pub first_day: NaiveDate,
    /// Last local day covered (inclusive)
    pub last_day: NaiveDate,
}

impl ReportWindow {
    /// Local days `first..end_day` (end exclusive)
    pub fn days(first_day: NaiveDate, end_day: NaiveDate, offset: FixedOffset) -> Self {
        Self {
            start: local_midnight(first_day, offset),
            end: local_midnight(end_day, offset),
            first_day,
            last_day: end_day - Duration::days(1),
        }
    }

    pub fn month(year: i32, month: u32, offset: FixedOffset) -> Self {
        let (next_year, next_month) = shift_month(year, month, 1);
        Self::days(first_of_month(year, month), first_of_month(next_year, next_month), offset)
    }

    /// The calendar month before the one this window starts in
    pub fn previous_month(&self, offset: FixedOffset) -> Self {
        let (year, month) = shift_month(self.first_day.year(), self.first_day.month(), -1);
        Self::month(year, month, offset)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// `(year, month)` moved by `delta` months
pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

/// UTC instant of local midnight starting `date`
pub fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    (date.and_time(NaiveTime::MIN) - Duration::seconds(offset.local_minus_utc() as i64)).and_utc()
}

pub fn local_month_start(year: i32, month: u32, offset: FixedOffset) -> DateTime<Utc> {
    local_midnight(first_of_month(year, month), offset)
}

pub fn local_today(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Frequencies due on `date`: daily always, weekly on Mondays, monthly on the 1st
pub fn frequencies_for(date: NaiveDate) -> Vec<ReportFrequency> {
    let mut due = vec![ReportFrequency::Daily];
    if date.weekday() == Weekday::Mon {
        due.push(ReportFrequency::Weekly);
    }
    if date.day() == 1 {
        due.push(ReportFrequency::Monthly);
    }
    due
}

/// Window covered by a scheduled run on `today`.
///
/// Weekly covers the seven days before today; monthly covers the previous
/// calendar month.
pub fn scheduled_window(frequency: ReportFrequency, today: NaiveDate, offset: FixedOffset) -> ReportWindow {
    match frequency {
        ReportFrequency::Daily => ReportWindow::days(today, today + Duration::days(1), offset),
        ReportFrequency::Weekly => ReportWindow::days(today - Duration::days(7), today, offset),
        ReportFrequency::Monthly => {
            let (year, month) = shift_month(today.year(), today.month(), -1);
            ReportWindow::month(year, month, offset)
        }
    }
}

/// Period-to-date window for a manual run on `today`
pub fn manual_window(frequency: ReportFrequency, today: NaiveDate, offset: FixedOffset) -> ReportWindow {
    match frequency {
        ReportFrequency::Daily => ReportWindow::days(today, today + Duration::days(1), offset),
        ReportFrequency::Weekly => {
            let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
            ReportWindow::days(monday, monday + Duration::days(7), offset)
        }
        ReportFrequency::Monthly => ReportWindow::month(today.year(), today.month(), offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tr() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    #[test]
    fn frequencies_by_weekday_and_month_day() {
        // 2025-09-01 is a Monday and the 1st
        assert_eq!(
            frequencies_for(date(2025, 9, 1)),
            vec![ReportFrequency::Daily, ReportFrequency::Weekly, ReportFrequency::Monthly]
        );
        // Monday, not the 1st
        assert_eq!(
            frequencies_for(date(2025, 9, 8)),
            vec![ReportFrequency::Daily, ReportFrequency::Weekly]
        );
        // Wednesday the 1st
        assert_eq!(
            frequencies_for(date(2025, 10, 1)),
            vec![ReportFrequency::Daily, ReportFrequency::Monthly]
        );
        assert_eq!(frequencies_for(date(2025, 10, 2)), vec![ReportFrequency::Daily]);
    }

    #[test]
    fn shift_month_wraps_years() {
        assert_eq!(shift_month(2025, 1, -1), (2024, 12));
        assert_eq!(shift_month(2025, 12, 1), (2026, 1));
        assert_eq!(shift_month(2025, 3, -11), (2024, 4));
        assert_eq!(shift_month(2025, 3, -27), (2022, 12));
    }

    #[test]
    fn midnight_respects_offset() {
        assert_eq!(
            local_midnight(date(2025, 3, 10), tr()),
            Utc.with_ymd_and_hms(2025, 3, 9, 21, 0, 0).unwrap()
        );
        assert_eq!(
            local_today(Utc.with_ymd_and_hms(2025, 3, 9, 22, 0, 0).unwrap(), tr()),
            date(2025, 3, 10)
        );
    }

    #[test]
    fn scheduled_windows() {
        let today = date(2025, 3, 3);

        let daily = scheduled_window(ReportFrequency::Daily, today, tr());
        assert_eq!(daily.first_day, today);
        assert_eq!(daily.last_day, today);
        assert_eq!(daily.end - daily.start, Duration::days(1));

        let weekly = scheduled_window(ReportFrequency::Weekly, today, tr());
        assert_eq!(weekly.first_day, date(2025, 2, 24));
        assert_eq!(weekly.last_day, date(2025, 3, 2));
        assert_eq!(weekly.end, daily.start);

        let monthly = scheduled_window(ReportFrequency::Monthly, date(2025, 3, 1), tr());
        assert_eq!(monthly.first_day, date(2025, 2, 1));
        assert_eq!(monthly.last_day, date(2025, 2, 28));
        let before = monthly.previous_month(tr());
        assert_eq!(before.first_day, date(2025, 1, 1));
        assert_eq!(before.end, monthly.start);
    }

    #[test]
    fn manual_windows_are_period_to_date() {
        // Thursday
        let today = date(2025, 3, 13);
        let weekly = manual_window(ReportFrequency::Weekly, today, tr());
        assert_eq!(weekly.first_day, date(2025, 3, 10));
        assert_eq!(weekly.last_day, date(2025, 3, 16));

        let monthly = manual_window(ReportFrequency::Monthly, today, tr());
        assert_eq!(monthly.first_day, date(2025, 3, 1));
        assert_eq!(monthly.last_day, date(2025, 3, 31));

        let january = manual_window(ReportFrequency::Monthly, date(2025, 1, 20), tr());
        assert_eq!(january.previous_month(tr()).first_day, date(2024, 12, 1));
    }

    #[test]
    fn windows_are_half_open() {
        let window = ReportWindow::days(date(2025, 3, 10), date(2025, 3, 11), tr());
        assert!(window.contains(window.start));
        assert!(!window.contains(window.end));
        let next = ReportWindow::days(date(2025, 3, 11), date(2025, 3, 12), tr());
        assert!(next.contains(window.end));
    }
}
