use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum length for user passwords
pub const MIN_PASSWORD_LEN: usize = 6;

/// Default page sizes for paginated listings
pub const TRANSACTIONS_PAGE_LIMIT: i64 = 50;
pub const ACTIVITY_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 200;

/// Invoice numbers look like FTR-00001
pub const INVOICE_PREFIX: &str = "FTR-";
pub const INVOICE_NUMBER_WIDTH: usize = 5;

/// How many categories a report ranks
pub const TOP_CATEGORY_COUNT: usize = 5;

/// Dashboard widget sizes
pub const DASHBOARD_MONTHS: u32 = 12;
pub const DASHBOARD_UPCOMING_TASKS: i64 = 5;
pub const DASHBOARD_RECENT_ACTIVITY: i64 = 10;
pub const PROFILE_RECENT_TASKS: i64 = 10;

/// Session header accepted next to `Authorization: Bearer`
pub const SESSION_HEADER: &str = "x-alphacore-session";

// ========================
// User-facing messages
// ========================

pub const MSG_EMAIL_TAKEN: &str = "Bu email adresi zaten kullanılıyor";
pub const MSG_INVALID_CREDENTIALS: &str = "Email veya şifre hatalı";
pub const MSG_CANNOT_DELETE_SELF: &str = "Kendi hesabınızı silemezsiniz";
pub const MSG_WRONG_PASSWORD: &str = "Mevcut şifre hatalı";
pub const MSG_CATEGORY_IN_USE: &str = "Bu kategoriye ait işlemler var, silinemez";
pub const MSG_CATEGORY_NOT_FOUND: &str = "Kategori bulunamadı";
pub const MSG_USER_NOT_FOUND: &str = "Kullanıcı bulunamadı";
pub const MSG_PROJECT_NOT_FOUND: &str = "Proje bulunamadı";
pub const MSG_TASK_NOT_FOUND: &str = "Görev bulunamadı";
pub const MSG_ALREADY_MEMBER: &str = "Kullanıcı zaten proje üyesi";
pub const MSG_LAST_OWNER: &str = "Projenin son sahibi kaldırılamaz";
pub const MSG_NO_SCHEDULES: &str = "No active schedules to run";

/// Turkish month names, January first
pub const MONTHS_TR: [&str; 12] = [
    "Ocak", "Şubat", "Mart", "Nisan", "Mayıs", "Haziran",
    "Temmuz", "Ağustos", "Eylül", "Ekim", "Kasım", "Aralık",
];

/// Loose email shape check: something@something.tld, no whitespace
pub static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
        .expect("Invalid regex pattern for email")
});

/// Trailing digits of an invoice number
pub static RE_TRAILING_DIGITS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)$")
        .expect("Invalid regex pattern for trailing digits")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_pattern() {
        assert!(RE_EMAIL.is_match("admin@alphacore.com.tr"));
        assert!(!RE_EMAIL.is_match("admin@alphacore"));
        assert!(!RE_EMAIL.is_match("ad min@alphacore.com"));
        assert!(!RE_EMAIL.is_match(""));
    }

    #[test]
    fn trailing_digits() {
        let caps = RE_TRAILING_DIGITS.captures("FTR-00042").unwrap();
        assert_eq!(&caps[1], "00042");
        assert!(RE_TRAILING_DIGITS.captures("FTR-").is_none());
    }
}
