//! Scheduled email reports
//!
//! `period` decides which reports are due and which window each covers,
//! `aggregate` collects the numbers, `render` turns them into HTML,
//! `mailer` delivers, and `runner` drives a whole run.

pub mod aggregate;
pub mod format;
pub mod mailer;
pub mod period;
pub mod render;
pub mod runner;

pub use mailer::{mailer_from_config, Mailer};
#[doc(hidden)]
pub use mailer::RecordingMailer;
pub use runner::{check_cron_secret, ManualRun, ReportService, ScheduledRun};
