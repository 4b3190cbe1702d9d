//! Turkish (tr-TR) display formatting for report emails

use chrono::{Datelike, NaiveDate};

use crate::constants::MONTHS_TR;

/// `₺1.234,56`, with a leading minus for negative amounts
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}₺{},{:02}", sign, grouped, cents % 100)
}

/// `05.03.2025`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// `5 Mart 2025`
pub fn format_long_date(date: NaiveDate) -> String {
    format!("{} {} {}", date.day(), month_name(date.month()), date.year())
}

/// `Mart 2025`
pub fn format_month(date: NaiveDate) -> String {
    format!("{} {}", month_name(date.month()), date.year())
}

/// `+12.5%` / `-3.0%`
pub fn format_change(percent: f64) -> String {
    let sign = if percent >= 0.0 { "+" } else { "" };
    format!("{}{:.1}%", sign, percent)
}

fn month_name(month: u32) -> &'static str {
    MONTHS_TR
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(0.0), "₺0,00");
        assert_eq!(format_currency(1234.56), "₺1.234,56");
        assert_eq!(format_currency(1_000_000.0), "₺1.000.000,00");
        assert_eq!(format_currency(999.999), "₺1.000,00");
        assert_eq!(format_currency(-250.5), "-₺250,50");
        assert_eq!(format_currency(-0.001), "₺0,00");
    }

    #[test]
    fn dates_in_turkish() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(format_date(date), "05.03.2025");
        assert_eq!(format_long_date(date), "5 Mart 2025");
        assert_eq!(format_month(date), "Mart 2025");
        let december = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(format_month(december), "Aralık 2024");
    }

    #[test]
    fn change_has_explicit_sign() {
        assert_eq!(format_change(12.345), "+12.3%");
        assert_eq!(format_change(0.0), "+0.0%");
        assert_eq!(format_change(-3.0), "-3.0%");
    }
}
