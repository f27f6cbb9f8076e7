use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use hourglass_storage::{Database, Event, HourSlot, HourlyUsage, ReplaceOutcome};
use std::collections::BTreeMap;

use crate::classifier::CategorySnapshot;

/// What one hourly pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HourlyPassReport {
    pub reprocess_from: NaiveDateTime,
    pub events: usize,
    pub rejected: usize,
    pub buckets: usize,
    pub outcome: ReplaceOutcome,
}

/// Rolls raw events into per-hour, per-app buckets
#[derive(Debug, Clone)]
pub struct HourlyAggregator {
    lookback: chrono::Duration,
}

/// Grouping key of an hourly bucket
type HourlyKey = (NaiveDate, u32, String, String, Option<String>);

impl HourlyAggregator {
    #[must_use]
    pub fn new(lookback: chrono::Duration) -> Self {
        Self { lookback }
    }

    /// First instant a pass re-reads, given the latest aggregated hour.
    ///
    /// The result is always an hour boundary, so every hour a pass touches
    /// is read in full.
    #[must_use]
    pub fn reprocess_from(&self, watermark: Option<HourSlot>) -> NaiveDateTime {
        watermark.map_or_else(NaiveDateTime::default, |slot| {
            slot.end()
                .checked_sub_signed(self.lookback)
                .unwrap_or_default()
        })
    }

    /// One incremental pass: re-aggregate every hour from the watermark
    /// minus the lookback
    ///
    /// # Errors
    ///
    /// Returns an error if reading events or replacing buckets fails; stored
    /// buckets are unchanged in that case
    pub fn run(&self, db: &mut Database, categories: &CategorySnapshot) -> Result<HourlyPassReport> {
        let watermark = db.latest_hour_slot()?;
        let since = self.reprocess_from(watermark);
        log::debug!("Processing hourly data since: {since} (watermark: {watermark:?})");
        Self::aggregate_since(db, categories, since)
    }

    /// Re-aggregate every hour that has events
    ///
    /// # Errors
    ///
    /// Returns an error if reading events or replacing buckets fails
    pub fn backfill(&self, db: &mut Database, categories: &CategorySnapshot) -> Result<HourlyPassReport> {
        log::info!("Backfilling hourly usage from the first event");
        Self::aggregate_since(db, categories, NaiveDateTime::default())
    }

    fn aggregate_since(
        db: &mut Database,
        categories: &CategorySnapshot,
        since: NaiveDateTime,
    ) -> Result<HourlyPassReport> {
        let scan = db
            .scan_events(since, None)
            .context("Failed to scan events")?;

        for rejected in &scan.rejected {
            log::warn!("Skipping {rejected}");
        }

        let mut report = HourlyPassReport {
            reprocess_from: since,
            events: scan.events.len(),
            rejected: scan.rejected.len(),
            ..HourlyPassReport::default()
        };

        if scan.events.is_empty() {
            log::debug!("No new hourly data to process");
            return Ok(report);
        }

        let buckets = group_events(&scan.events, categories)?;
        report.buckets = buckets.len();
        report.outcome = db.replace_hourly_usage(buckets)?;

        log::info!(
            "Processed {} hourly aggregations for {} hour-slots ({} rewritten)",
            report.buckets,
            report.outcome.partitions,
            report.outcome.rewritten
        );
        Ok(report)
    }
}

/// Group events by (date, hour, device, app, url), summing durations and
/// resolving each group's category
///
/// # Errors
///
/// Returns an error if a group's total duration does not fit in an `i64`
pub fn group_events(events: &[Event], categories: &CategorySnapshot) -> Result<Vec<HourlyUsage>> {
    let mut groups: BTreeMap<HourlyKey, (i64, i64)> = BTreeMap::new();
    for event in events {
        let slot = event.slot();
        let entry = groups
            .entry((
                slot.date,
                slot.hour,
                event.device_type.clone(),
                event.app_name.clone(),
                event.website_url.clone(),
            ))
            .or_insert((0, 0));
        entry.0 += 1;
        entry.1 = entry
            .1
            .checked_add(event.duration_seconds)
            .with_context(|| {
                format!(
                    "Total duration of '{}' at {} {:02}:00 overflows",
                    event.app_name, slot.date, slot.hour
                )
            })?;
    }

    let buckets = groups
        .into_iter()
        .map(
            |((date, hour, device_type, app_name, website_url), (event_count, total_seconds))| {
                HourlyUsage {
                    date,
                    hour,
                    category: categories.classify(&app_name).to_string(),
                    device_type,
                    app_name,
                    website_url,
                    total_seconds,
                    event_count,
                    created_at: None,
                }
            },
        )
        .collect();
    Ok(buckets)
}
