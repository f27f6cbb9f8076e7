use anyhow::{Context, Result};
use chrono::NaiveDate;
use hourglass_storage::{DailyTotal, DailyUsage, Database, ReplaceOutcome};

use crate::classifier::CategorySnapshot;

/// What one daily pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyPassReport {
    pub reprocess_from: NaiveDate,
    pub buckets: usize,
    pub outcome: ReplaceOutcome,
}

/// Rolls hourly buckets into per-day buckets and per-day category totals
#[derive(Debug, Clone)]
pub struct DailyAggregator {
    lookback: chrono::Duration,
}

impl DailyAggregator {
    #[must_use]
    pub fn new(lookback: chrono::Duration) -> Self {
        Self { lookback }
    }

    /// First date a pass re-reads, given the latest aggregated date
    #[must_use]
    pub fn reprocess_from(&self, watermark: Option<NaiveDate>) -> NaiveDate {
        watermark.map_or_else(NaiveDate::default, |date| {
            date.checked_sub_signed(self.lookback).unwrap_or_default()
        })
    }

    /// One incremental pass over the hourly table
    ///
    /// # Errors
    ///
    /// Returns an error if reading hourly buckets or replacing daily buckets
    /// fails; stored buckets are unchanged in that case
    pub fn run(&self, db: &mut Database, categories: &CategorySnapshot) -> Result<DailyPassReport> {
        let watermark = db.latest_daily_date()?;
        let since = self.reprocess_from(watermark);
        log::debug!("Processing daily data since: {since} (watermark: {watermark:?})");
        Self::aggregate_since(db, categories, since)
    }

    /// Re-aggregate every day present in the hourly table
    ///
    /// # Errors
    ///
    /// Returns an error if reading hourly buckets or replacing daily buckets fails
    pub fn backfill(&self, db: &mut Database, categories: &CategorySnapshot) -> Result<DailyPassReport> {
        log::info!("Backfilling daily usage from the first hourly bucket");
        Self::aggregate_since(db, categories, NaiveDate::default())
    }

    fn aggregate_since(
        db: &mut Database,
        categories: &CategorySnapshot,
        since: NaiveDate,
    ) -> Result<DailyPassReport> {
        let totals = db
            .hourly_totals_since(since)
            .context("Failed to read hourly usage")?;

        let mut report = DailyPassReport {
            reprocess_from: since,
            ..DailyPassReport::default()
        };

        if totals.is_empty() {
            log::debug!("No new daily data to process");
            return Ok(report);
        }

        let buckets = resolve_totals(totals, categories);
        report.buckets = buckets.len();
        report.outcome = db.replace_daily_usage(buckets)?;

        log::info!(
            "Processed {} daily aggregations for {} day(s) ({} rewritten)",
            report.buckets,
            report.outcome.partitions,
            report.outcome.rewritten
        );
        Ok(report)
    }
}

/// Attach a freshly resolved category to each day total.
///
/// One app always lands in one category per day, even when its hourly rows
/// were classified under different rules.
#[must_use]
pub fn resolve_totals(totals: Vec<DailyTotal>, categories: &CategorySnapshot) -> Vec<DailyUsage> {
    totals
        .into_iter()
        .map(|total| DailyUsage {
            category: categories.classify(&total.app_name).to_string(),
            date: total.date,
            device_type: total.device_type,
            app_name: total.app_name,
            website_url: total.website_url,
            total_seconds: total.total_seconds,
            event_count: total.event_count,
            created_at: None,
        })
        .collect()
}
