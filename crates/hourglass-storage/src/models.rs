use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Device type recorded when the producer does not say otherwise
pub const DEFAULT_DEVICE_TYPE: &str = "desktop";

/// Raw usage event - one observation of the focused application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    pub device_type: String,
    pub app_name: String,
    pub window_title: Option<String>,
    pub website_url: Option<String>,
    pub duration_seconds: i64,
}

impl Event {
    /// Build an event for the default device, without title or url
    #[must_use]
    pub fn new(timestamp: NaiveDateTime, app_name: &str, duration_seconds: i64) -> Self {
        Self {
            id: 0,
            timestamp,
            device_type: String::from(DEFAULT_DEVICE_TYPE),
            app_name: app_name.to_string(),
            window_title: None,
            website_url: None,
            duration_seconds,
        }
    }

    #[must_use]
    pub fn with_website(mut self, url: &str) -> Self {
        self.website_url = Some(url.to_string());
        self
    }

    #[must_use]
    pub fn with_device(mut self, device_type: &str) -> Self {
        self.device_type = device_type.to_string();
        self
    }

    #[must_use]
    pub fn with_window_title(mut self, title: &str) -> Self {
        self.window_title = Some(title.to_string());
        self
    }

    /// Hour slot this event falls into
    #[must_use]
    pub fn slot(&self) -> HourSlot {
        HourSlot::of(self.timestamp)
    }
}

/// One (date, hour) partition of the hourly table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HourSlot {
    pub date: NaiveDate,
    pub hour: u32,
}

impl HourSlot {
    #[must_use]
    pub fn of(timestamp: NaiveDateTime) -> Self {
        Self {
            date: timestamp.date(),
            hour: timestamp.hour(),
        }
    }

    /// First instant of the slot
    #[must_use]
    pub fn start(&self) -> NaiveDateTime {
        self.date
            .and_hms_opt(self.hour, 0, 0)
            .unwrap_or_else(|| self.date.and_time(chrono::NaiveTime::MIN))
    }

    /// First instant after the slot
    #[must_use]
    pub fn end(&self) -> NaiveDateTime {
        self.start() + chrono::Duration::hours(1)
    }
}

/// Per-hour, per-app usage bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyUsage {
    pub date: NaiveDate,
    pub hour: u32,
    pub device_type: String,
    pub app_name: String,
    pub website_url: Option<String>,
    pub category: String,
    pub total_seconds: i64,
    pub event_count: i64,
    /// Set by storage on insert; `None` for buckets not yet written
    pub created_at: Option<DateTime<Utc>>,
}

impl HourlyUsage {
    #[must_use]
    pub fn slot(&self) -> HourSlot {
        HourSlot {
            date: self.date,
            hour: self.hour,
        }
    }

    /// Ordering used when comparing a stored partition with a recomputed one.
    /// Matches the `ORDER BY` of the storage queries.
    #[must_use]
    pub fn sort_key(&self) -> (HourSlot, &str, &str, Option<&str>) {
        (
            self.slot(),
            self.device_type.as_str(),
            self.app_name.as_str(),
            self.website_url.as_deref(),
        )
    }

    /// Equal key and totals, ignoring `created_at`
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
            && self.category == other.category
            && self.total_seconds == other.total_seconds
            && self.event_count == other.event_count
    }
}

/// Per-day, per-app usage bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub device_type: String,
    pub app_name: String,
    pub website_url: Option<String>,
    pub category: String,
    pub total_seconds: i64,
    pub event_count: i64,
    pub created_at: Option<DateTime<Utc>>,
}

impl DailyUsage {
    #[must_use]
    pub fn sort_key(&self) -> (NaiveDate, &str, &str, Option<&str>) {
        (
            self.date,
            self.device_type.as_str(),
            self.app_name.as_str(),
            self.website_url.as_deref(),
        )
    }

    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
            && self.category == other.category
            && self.total_seconds == other.total_seconds
            && self.event_count == other.event_count
    }
}

/// Per-day, per-category total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCategoryUsage {
    pub date: NaiveDate,
    pub device_type: String,
    pub category: String,
    pub total_seconds: i64,
    pub created_at: Option<DateTime<Utc>>,
}

/// Hourly buckets summed to one (date, device, app, url) key.
/// Category is resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub device_type: String,
    pub app_name: String,
    pub website_url: Option<String>,
    pub total_seconds: i64,
    pub event_count: i64,
}

/// Category as mirrored into the `categories` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub name: String,
    pub color: String,
    pub description: String,
}

/// Flattened pattern mapping as mirrored into the `app_categories` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCategory {
    pub app_name: String,
    pub category: String,
}

/// Row counts and watermarks of the aggregation tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableStats {
    pub events: i64,
    pub hourly_rows: i64,
    pub daily_rows: i64,
    pub daily_category_rows: i64,
    pub latest_event: Option<String>,
    pub hourly_watermark: Option<HourSlot>,
    pub daily_watermark: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_hour_slot_bounds() {
        let slot = HourSlot::of(ts("2024-01-01 23:15:00"));
        assert_eq!(slot.hour, 23);
        assert_eq!(slot.start(), ts("2024-01-01 23:00:00"));
        assert_eq!(slot.end(), ts("2024-01-02 00:00:00"));
    }

    #[test]
    fn test_hour_slot_ordering() {
        let a = HourSlot::of(ts("2024-01-01 23:00:00"));
        let b = HourSlot::of(ts("2024-01-02 00:00:00"));
        assert!(a < b);
    }

    #[test]
    fn test_same_content_ignores_created_at() {
        let bucket = HourlyUsage {
            date: ts("2024-01-01 10:00:00").date(),
            hour: 10,
            device_type: "desktop".to_string(),
            app_name: "firefox".to_string(),
            website_url: None,
            category: "Browsers".to_string(),
            total_seconds: 50,
            event_count: 2,
            created_at: None,
        };
        let mut stored = bucket.clone();
        stored.created_at = Some(Utc::now());
        assert!(bucket.same_content(&stored));

        stored.total_seconds = 51;
        assert!(!bucket.same_content(&stored));
    }
}
