use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Row};

use super::helpers::{parse_date, parse_datetime, DATE_FORMAT};
use super::replace::{replace_partitions, DailyTable, ReplaceOutcome};
use super::Database;
use crate::models::{DailyCategoryUsage, DailyUsage};

pub(crate) const DAILY_COLUMNS: &str =
    "date, device_type, app_name, website_url, category, total_seconds, event_count, created_at";

/// Order matching [`DailyUsage::sort_key`]
pub(crate) const DAILY_ORDER: &str = "date, device_type, app_name, website_url";

impl Database {
    // ==================== Daily Usage Methods ====================

    /// Latest date present in `daily_usage`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored date is malformed
    pub fn latest_daily_date(&self) -> Result<Option<NaiveDate>> {
        let latest: Option<String> = self
            .conn
            .query_row("SELECT MAX(date) FROM daily_usage", [], |row| row.get(0))
            .context("Failed to read daily watermark")?;

        latest
            .map(|s| parse_date(&s))
            .transpose()
            .context("Malformed date in daily_usage")
    }

    /// Daily buckets with `start <= date <= end`
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_daily_usage(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyUsage>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DAILY_COLUMNS} FROM daily_usage
             WHERE date BETWEEN ?1 AND ?2
             ORDER BY {DAILY_ORDER}"
        ))?;

        let buckets = stmt
            .query_map(
                params![
                    start.format(DATE_FORMAT).to_string(),
                    end.format(DATE_FORMAT).to_string()
                ],
                Self::row_to_daily_usage,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(buckets)
    }

    /// Category totals with `start <= date <= end`
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_daily_category_usage(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyCategoryUsage>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, device_type, category, total_seconds, created_at
             FROM daily_category_usage
             WHERE date BETWEEN ?1 AND ?2
             ORDER BY date, device_type, category",
        )?;

        let totals = stmt
            .query_map(
                params![
                    start.format(DATE_FORMAT).to_string(),
                    end.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    Ok(DailyCategoryUsage {
                        date: parse_date(&row.get::<_, String>(0)?)?,
                        device_type: row.get(1)?,
                        category: row.get(2)?,
                        total_seconds: row.get(3)?,
                        created_at: Some(parse_datetime(&row.get::<_, String>(4)?)?),
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(totals)
    }

    /// Atomically replace every date the given buckets belong to, and
    /// re-derive the category totals of those dates from the rows just
    /// written.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; nothing is changed then
    pub fn replace_daily_usage(&mut self, buckets: Vec<DailyUsage>) -> Result<ReplaceOutcome> {
        replace_partitions::<DailyTable>(&mut self.conn, buckets)
            .context("Failed to replace daily usage")
    }

    /// Helper function to parse `DailyUsage` from a row selected with `DAILY_COLUMNS`
    pub(crate) fn row_to_daily_usage(row: &Row) -> rusqlite::Result<DailyUsage> {
        Ok(DailyUsage {
            date: parse_date(&row.get::<_, String>(0)?)?,
            device_type: row.get(1)?,
            app_name: row.get(2)?,
            website_url: row.get(3)?,
            category: row.get(4)?,
            total_seconds: row.get(5)?,
            event_count: row.get(6)?,
            created_at: Some(parse_datetime(&row.get::<_, String>(7)?)?),
        })
    }
}
