pub mod db;
pub mod error;
pub mod migrations;
pub mod models;

pub use db::{Database, EventScan, ReplaceOutcome, MAX_EVENT_DURATION_SECS};
pub use error::{EventRowError, RejectedEvent};
pub use models::{
    AppCategory, CategoryRecord, DailyCategoryUsage, DailyTotal, DailyUsage, Event, HourSlot,
    HourlyUsage, TableStats, DEFAULT_DEVICE_TYPE,
};
