pub mod manager;

pub use manager::{
    next_fire_time, start_report_scheduler, status, SchedulerManager, SchedulerState, SchedulerStatus,
    SharedSchedulerState,
};
