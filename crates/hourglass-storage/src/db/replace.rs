//! Atomic replacement of bucket partitions.
//!
//! Aggregated tables are never updated row by row. A pass recomputes every
//! bucket of the partitions it touched (an hour slot, a day) and swaps the
//! whole partition inside one transaction, so re-running a pass over the same
//! input yields the same rows and a crash mid-pass leaves the previous rows
//! in place.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, Transaction};
use std::collections::BTreeMap;
use std::fmt::Debug;

use super::daily::{DAILY_COLUMNS, DAILY_ORDER};
use super::helpers::DATE_FORMAT;
use super::hourly::{HOURLY_COLUMNS, HOURLY_ORDER};
use super::Database;
use crate::models::{DailyUsage, HourSlot, HourlyUsage};

/// What a replace call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Partitions covered by the new bucket set
    pub partitions: usize,
    /// Partitions whose stored rows differed and were swapped
    pub rewritten: usize,
    /// Rows inserted into the bucket table
    pub rows_written: usize,
}

impl ReplaceOutcome {
    #[must_use]
    pub const fn unchanged(&self) -> usize {
        self.partitions - self.rewritten
    }
}

/// A bucket table that is replaced one partition at a time
pub(crate) trait BucketTable {
    type Partition: Ord + Copy + Debug;
    type Bucket;

    const TABLE: &'static str;

    fn partition_of(bucket: &Self::Bucket) -> Self::Partition;

    /// Sort into the order `load` returns rows in
    fn sort(buckets: &mut [Self::Bucket]);

    fn same_content(a: &Self::Bucket, b: &Self::Bucket) -> bool;

    fn load(tx: &Transaction, partition: Self::Partition) -> rusqlite::Result<Vec<Self::Bucket>>;

    fn delete(tx: &Transaction, partition: Self::Partition) -> rusqlite::Result<usize>;

    fn insert(tx: &Transaction, bucket: &Self::Bucket, created_at: &str) -> rusqlite::Result<()>;

    /// Runs after the partition's new rows are inserted, inside the same transaction
    fn after_insert(
        _tx: &Transaction,
        _partition: Self::Partition,
        _created_at: &str,
    ) -> rusqlite::Result<()> {
        Ok(())
    }
}

/// Replace every partition present in `buckets` with exactly those buckets.
///
/// Partitions not present in `buckets` are not touched. Partitions whose
/// stored content already equals the new content are left as they are,
/// `created_at` included.
pub(crate) fn replace_partitions<T: BucketTable>(
    conn: &mut Connection,
    buckets: Vec<T::Bucket>,
) -> rusqlite::Result<ReplaceOutcome> {
    let mut partitions: BTreeMap<T::Partition, Vec<T::Bucket>> = BTreeMap::new();
    for bucket in buckets {
        partitions
            .entry(T::partition_of(&bucket))
            .or_default()
            .push(bucket);
    }

    let mut outcome = ReplaceOutcome {
        partitions: partitions.len(),
        ..ReplaceOutcome::default()
    };
    if partitions.is_empty() {
        return Ok(outcome);
    }

    let created_at = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;

    for (partition, mut fresh) in partitions {
        T::sort(&mut fresh);
        let stored = T::load(&tx, partition)?;
        let unchanged = stored.len() == fresh.len()
            && stored.iter().zip(&fresh).all(|(a, b)| T::same_content(a, b));
        if unchanged {
            continue;
        }

        let deleted = T::delete(&tx, partition)?;
        for bucket in &fresh {
            T::insert(&tx, bucket, &created_at)?;
        }
        T::after_insert(&tx, partition, &created_at)?;

        log::debug!(
            "{}: replaced {partition:?} ({deleted} -> {} rows)",
            T::TABLE,
            fresh.len()
        );
        outcome.rewritten += 1;
        outcome.rows_written += fresh.len();
    }

    tx.commit()?;
    Ok(outcome)
}

pub(crate) struct HourlyTable;

impl BucketTable for HourlyTable {
    type Partition = HourSlot;
    type Bucket = HourlyUsage;

    const TABLE: &'static str = "hourly_usage";

    fn partition_of(bucket: &HourlyUsage) -> HourSlot {
        bucket.slot()
    }

    fn sort(buckets: &mut [HourlyUsage]) {
        buckets.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }

    fn same_content(a: &HourlyUsage, b: &HourlyUsage) -> bool {
        a.same_content(b)
    }

    fn load(tx: &Transaction, slot: HourSlot) -> rusqlite::Result<Vec<HourlyUsage>> {
        let mut stmt = tx.prepare(&format!(
            "SELECT {HOURLY_COLUMNS} FROM hourly_usage
             WHERE date = ?1 AND hour = ?2
             ORDER BY {HOURLY_ORDER}"
        ))?;
        let rows = stmt
            .query_map(
                params![slot.date.format(DATE_FORMAT).to_string(), slot.hour],
                Database::row_to_hourly_usage,
            )?
            .collect();
        rows
    }

    fn delete(tx: &Transaction, slot: HourSlot) -> rusqlite::Result<usize> {
        tx.execute(
            "DELETE FROM hourly_usage WHERE date = ?1 AND hour = ?2",
            params![slot.date.format(DATE_FORMAT).to_string(), slot.hour],
        )
    }

    fn insert(tx: &Transaction, bucket: &HourlyUsage, created_at: &str) -> rusqlite::Result<()> {
        tx.execute(
            &format!(
                "INSERT INTO hourly_usage ({HOURLY_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                bucket.date.format(DATE_FORMAT).to_string(),
                bucket.hour,
                bucket.device_type,
                bucket.app_name,
                bucket.website_url,
                bucket.category,
                bucket.total_seconds,
                bucket.event_count,
                created_at,
            ],
        )?;
        Ok(())
    }
}

pub(crate) struct DailyTable;

impl BucketTable for DailyTable {
    type Partition = NaiveDate;
    type Bucket = DailyUsage;

    const TABLE: &'static str = "daily_usage";

    fn partition_of(bucket: &DailyUsage) -> NaiveDate {
        bucket.date
    }

    fn sort(buckets: &mut [DailyUsage]) {
        buckets.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }

    fn same_content(a: &DailyUsage, b: &DailyUsage) -> bool {
        a.same_content(b)
    }

    fn load(tx: &Transaction, date: NaiveDate) -> rusqlite::Result<Vec<DailyUsage>> {
        let mut stmt = tx.prepare(&format!(
            "SELECT {DAILY_COLUMNS} FROM daily_usage
             WHERE date = ?1
             ORDER BY {DAILY_ORDER}"
        ))?;
        let rows = stmt
            .query_map(
                params![date.format(DATE_FORMAT).to_string()],
                Database::row_to_daily_usage,
            )?
            .collect();
        rows
    }

    fn delete(tx: &Transaction, date: NaiveDate) -> rusqlite::Result<usize> {
        let date = date.format(DATE_FORMAT).to_string();
        tx.execute(
            "DELETE FROM daily_category_usage WHERE date = ?1",
            params![date],
        )?;
        tx.execute("DELETE FROM daily_usage WHERE date = ?1", params![date])
    }

    fn insert(tx: &Transaction, bucket: &DailyUsage, created_at: &str) -> rusqlite::Result<()> {
        tx.execute(
            &format!(
                "INSERT INTO daily_usage ({DAILY_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                bucket.date.format(DATE_FORMAT).to_string(),
                bucket.device_type,
                bucket.app_name,
                bucket.website_url,
                bucket.category,
                bucket.total_seconds,
                bucket.event_count,
                created_at,
            ],
        )?;
        Ok(())
    }

    /// Category totals are read back from the rows just inserted, so they
    /// always add up to the day's usage total.
    fn after_insert(tx: &Transaction, date: NaiveDate, created_at: &str) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT INTO daily_category_usage (date, device_type, category, total_seconds, created_at)
             SELECT date, device_type, category, SUM(total_seconds), ?2
             FROM daily_usage
             WHERE date = ?1
             GROUP BY date, device_type, category",
            params![date.format(DATE_FORMAT).to_string(), created_at],
        )?;
        Ok(())
    }
}
