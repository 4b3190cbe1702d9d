use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "alphacore.yaml";

/// Server configuration
///
/// Values come from an optional YAML file and are then overridden by
/// environment variables, so a bare environment is enough to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_host: String,
    pub api_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub cron_secret: Option<String>,
    pub email: EmailConfig,
    pub reports: ReportsConfig,
    pub session_ttl_hours: i64,
    pub log_level: String,
}

/// Outgoing email settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub resend_api_key: Option<String>,
    pub from: String,
    pub api_url: String,
}

/// Report scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// 6-field cron expression (with seconds), evaluated in UTC
    pub cron: String,
    pub scheduler_enabled: bool,
    /// Offset used to decide "today" and report windows
    pub utc_offset_minutes: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_host: "127.0.0.1".to_string(),
            api_port: 3030,
            database_url: default_database_url(),
            database_max_connections: 5,
            cron_secret: None,
            email: EmailConfig::default(),
            reports: ReportsConfig::default(),
            session_ttl_hours: 24 * 30,
            log_level: "info".to_string(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            resend_api_key: None,
            from: "noreply@alphacore.com.tr".to_string(),
            api_url: "https://api.resend.com/emails".to_string(),
        }
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            // 08:00 UTC = 11:00 in Türkiye
            cron: "0 0 8 * * *".to_string(),
            scheduler_enabled: true,
            utc_offset_minutes: 180,
        }
    }
}

impl ReportsConfig {
    /// Offset as a chrono `FixedOffset`; out-of-range values fall back to UTC
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

fn default_database_url() -> String {
    let dir = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("alphacore");
    format!("sqlite://{}?mode=rwc", dir.join("alphacore.db").display())
}

impl AppConfig {
    /// Load configuration: YAML file (if any) then environment overrides
    ///
    /// The file path comes from `ALPHACORE_CONFIG`, falling back to
    /// `alphacore.yaml` in the working directory. A missing default file is
    /// not an error; a missing explicit file is.
    pub fn load() -> Result<Self, String> {
        let (path, explicit) = match std::env::var("ALPHACORE_CONFIG") {
            Ok(p) => (PathBuf::from(p), true),
            Err(_) => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else if explicit {
            return Err(format!("Config file not found: {}", path.display()));
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML config file with a size guard
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let metadata = fs::metadata(path)
            .map_err(|e| format!("Failed to read file metadata: {}", e))?;

        if metadata.len() > 1_048_576 {
            return Err(format!("Config file too large: {} bytes (max 1MB)", metadata.len()));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        serde_yaml::from_str(&contents).map_err(|e| format!("Failed to parse YAML: {}", e))
    }

    /// Override fields from environment-style lookups
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("ALPHACORE_API_HOST") {
            self.api_host = host;
        }
        if let Some(port) = lookup("ALPHACORE_API_PORT") {
            self.api_port = parse_var("ALPHACORE_API_PORT", &port)?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(max) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database_max_connections = parse_var("DATABASE_MAX_CONNECTIONS", &max)?;
        }
        if let Some(secret) = lookup("CRON_SECRET") {
            self.cron_secret = Some(secret).filter(|s| !s.is_empty());
        }
        if let Some(key) = lookup("RESEND_API_KEY") {
            self.email.resend_api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(from) = lookup("EMAIL_FROM") {
            self.email.from = from;
        }
        if let Some(cron) = lookup("REPORT_CRON") {
            self.reports.cron = cron;
        }
        if let Some(enabled) = lookup("REPORT_SCHEDULER_ENABLED") {
            self.reports.scheduler_enabled = parse_bool(&enabled);
        }
        if let Some(offset) = lookup("REPORT_UTC_OFFSET_MINUTES") {
            self.reports.utc_offset_minutes = parse_var("REPORT_UTC_OFFSET_MINUTES", &offset)?;
        }
        if let Some(ttl) = lookup("SESSION_TTL_HOURS") {
            self.session_ttl_hours = parse_var("SESSION_TTL_HOURS", &ttl)?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    /// Validate configuration constraints
    pub fn validate(&self) -> Result<(), String> {
        if self.api_port == 0 {
            return Err("api_port must be non-zero".to_string());
        }
        if self.session_ttl_hours <= 0 {
            return Err("session_ttl_hours must be positive".to_string());
        }
        if self.reports.utc_offset_minutes.abs() > 14 * 60 {
            return Err(format!(
                "utc_offset_minutes out of range: {} (max ±840)",
                self.reports.utc_offset_minutes
            ));
        }
        cron::Schedule::from_str(&self.reports.cron)
            .map_err(|e| format!("Invalid report cron '{}': {}", self.reports.cron, e))?;
        Ok(())
    }

    /// Whether the API is reachable from outside this machine
    pub fn is_network_exposed(&self) -> bool {
        !matches!(self.api_host.as_str(), "127.0.0.1" | "localhost" | "::1")
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("Invalid value for {}: '{}' ({})", key, value, e))
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.api_port, 3030);
        assert_eq!(config.reports.utc_offset_minutes, 180);
        assert!(config.cron_secret.is_none());
        assert_eq!(config.reports.offset().local_minus_utc(), 3 * 3600);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "api_port: 4000\nemail:\n  from: reports@example.com\nreports:\n  utc_offset_minutes: 0"
        )
        .unwrap();

        let mut config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.api_port, 4000);
        assert_eq!(config.email.from, "reports@example.com");
        // Unspecified nested fields keep their defaults
        assert_eq!(config.reports.cron, "0 0 8 * * *");

        let env: HashMap<&str, &str> = [
            ("ALPHACORE_API_PORT", "5000"),
            ("CRON_SECRET", "s3cret"),
            ("RESEND_API_KEY", ""),
            ("REPORT_SCHEDULER_ENABLED", "false"),
        ]
        .into_iter()
        .collect();
        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.api_port, 5000);
        assert_eq!(config.cron_secret.as_deref(), Some("s3cret"));
        assert!(config.email.resend_api_key.is_none());
        assert!(!config.reports.scheduler_enabled);
        assert_eq!(config.reports.utc_offset_minutes, 0);
    }

    #[test]
    fn bad_port_is_reported() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|k| (k == "ALPHACORE_API_PORT").then(|| "abc".to_string()))
            .unwrap_err();
        assert!(err.contains("ALPHACORE_API_PORT"));
    }

    #[test]
    fn invalid_cron_fails_validation() {
        let mut config = AppConfig::default();
        config.reports.cron = "every day".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn offset_out_of_range_fails_validation() {
        let mut config = AppConfig::default();
        config.reports.utc_offset_minutes = 15 * 60;
        assert!(config.validate().is_err());
    }
}
