use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, types::Value};

use super::helpers::{parse_event_timestamp, timestamp_lower_bound, timestamp_upper_bound};
use super::Database;
use crate::error::{EventRowError, RejectedEvent};
use crate::models::Event;

/// Longest single observation accepted, one day
pub const MAX_EVENT_DURATION_SECS: i64 = 86_400;

/// Result of reading the event log: the valid rows and the refused ones
#[derive(Debug, Default)]
pub struct EventScan {
    pub events: Vec<Event>,
    pub rejected: Vec<RejectedEvent>,
}

/// Raw column values of one `events` row, before validation
struct RawEvent {
    id: i64,
    timestamp: String,
    device_type: String,
    app_name: String,
    window_title: Option<String>,
    website_url: Option<String>,
    duration: Value,
}

impl RawEvent {
    fn validate(self) -> Result<Event, RejectedEvent> {
        let reject = |raw: &Self, reason| RejectedEvent {
            id: raw.id,
            raw_timestamp: raw.timestamp.clone(),
            reason,
        };

        let Some(timestamp) = parse_event_timestamp(&self.timestamp) else {
            return Err(reject(
                &self,
                EventRowError::InvalidTimestamp(self.timestamp.clone()),
            ));
        };

        let duration_seconds = match &self.duration {
            Value::Integer(n) if *n < 0 => {
                return Err(reject(&self, EventRowError::NegativeDuration(*n)))
            }
            Value::Integer(n) if *n > MAX_EVENT_DURATION_SECS => {
                return Err(reject(&self, EventRowError::DurationTooLong(*n)))
            }
            Value::Integer(n) => *n,
            other => {
                return Err(reject(
                    &self,
                    EventRowError::InvalidDuration(format!("{other:?}")),
                ))
            }
        };

        if self.app_name.trim().is_empty() {
            return Err(reject(&self, EventRowError::EmptyAppName));
        }

        Ok(Event {
            id: self.id,
            timestamp,
            device_type: self.device_type,
            app_name: self.app_name,
            window_title: self.window_title,
            // Bucket keys treat a blank url and a missing one alike
            website_url: self.website_url.filter(|url| !url.trim().is_empty()),
            duration_seconds,
        })
    }
}

impl Database {
    // ==================== Event Methods ====================

    /// Append an event, as the producer does. Returns the new row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert operation fails
    pub fn insert_event(&self, event: &Event) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO events (timestamp, device_type, app_name, window_title, website_url, duration_seconds)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.timestamp.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
                event.device_type,
                event.app_name,
                event.window_title,
                event.website_url,
                event.duration_seconds,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Read events with `since <= timestamp < until` (`until` optional).
    ///
    /// Every row is validated; rows that cannot be aggregated are returned in
    /// [`EventScan::rejected`] instead of failing the whole scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn scan_events(
        &self,
        since: NaiveDateTime,
        until: Option<NaiveDateTime>,
    ) -> Result<EventScan> {
        // The string bounds select a superset; exact bounds are applied
        // after parsing.
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, device_type, app_name, window_title, website_url, duration_seconds
             FROM events
             WHERE timestamp >= ?1 AND (?2 IS NULL OR timestamp < ?2)
             ORDER BY id",
        )?;

        let rows = stmt
            .query_map(
                params![
                    timestamp_lower_bound(since),
                    until.map(timestamp_upper_bound)
                ],
                |row| {
                    Ok(RawEvent {
                        id: row.get(0)?,
                        timestamp: row.get(1)?,
                        device_type: row.get(2)?,
                        app_name: row.get(3)?,
                        window_title: row.get(4)?,
                        website_url: row.get(5)?,
                        duration: row.get(6)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read events")?;

        let in_range = |timestamp: NaiveDateTime| match until {
            Some(end) => timestamp >= since && timestamp < end,
            None => timestamp >= since,
        };

        let mut scan = EventScan::default();
        for raw in rows {
            match raw.validate() {
                Ok(event) if in_range(event.timestamp) => scan.events.push(event),
                Ok(_) => {}
                Err(rejected) => {
                    // Only report bad rows that fall inside the window
                    let outside = parse_event_timestamp(&rejected.raw_timestamp)
                        .is_some_and(|timestamp| !in_range(timestamp));
                    if !outside {
                        scan.rejected.push(rejected);
                    }
                }
            }
        }

        Ok(scan)
    }
}
