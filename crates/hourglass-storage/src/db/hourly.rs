use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::helpers::{parse_date, parse_datetime, parse_hour, DATE_FORMAT};
use super::replace::{replace_partitions, HourlyTable, ReplaceOutcome};
use super::Database;
use crate::models::{DailyTotal, HourSlot, HourlyUsage};

pub(crate) const HOURLY_COLUMNS: &str =
    "date, hour, device_type, app_name, website_url, category, total_seconds, event_count, created_at";

/// Order matching [`HourlyUsage::sort_key`]
pub(crate) const HOURLY_ORDER: &str = "date, hour, device_type, app_name, website_url";

impl Database {
    // ==================== Hourly Usage Methods ====================

    /// Latest (date, hour) present in `hourly_usage`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored row is malformed
    pub fn latest_hour_slot(&self) -> Result<Option<HourSlot>> {
        let slot = self
            .conn
            .query_row(
                "SELECT date, hour FROM hourly_usage ORDER BY date DESC, hour DESC LIMIT 1",
                [],
                |row| {
                    Ok(HourSlot {
                        date: parse_date(&row.get::<_, String>(0)?)?,
                        hour: parse_hour(row.get(1)?)?,
                    })
                },
            )
            .optional()
            .context("Failed to read hourly watermark")?;
        Ok(slot)
    }

    /// Hourly buckets with `start <= date <= end`
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_hourly_usage(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<HourlyUsage>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HOURLY_COLUMNS} FROM hourly_usage
             WHERE date BETWEEN ?1 AND ?2
             ORDER BY {HOURLY_ORDER}"
        ))?;

        let buckets = stmt
            .query_map(
                params![
                    start.format(DATE_FORMAT).to_string(),
                    end.format(DATE_FORMAT).to_string()
                ],
                Self::row_to_hourly_usage,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(buckets)
    }

    /// Sum hourly buckets per (date, device, app, url) for every date on or
    /// after `since`
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn hourly_totals_since(&self, since: NaiveDate) -> Result<Vec<DailyTotal>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, device_type, app_name, website_url,
                    SUM(total_seconds) AS total_seconds,
                    SUM(event_count) AS event_count
             FROM hourly_usage
             WHERE date >= ?1
             GROUP BY date, device_type, app_name, website_url
             ORDER BY date, device_type, app_name, website_url",
        )?;

        let totals = stmt
            .query_map(params![since.format(DATE_FORMAT).to_string()], |row| {
                Ok(DailyTotal {
                    date: parse_date(&row.get::<_, String>(0)?)?,
                    device_type: row.get(1)?,
                    app_name: row.get(2)?,
                    website_url: row.get(3)?,
                    total_seconds: row.get(4)?,
                    event_count: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to sum hourly usage")?;

        Ok(totals)
    }

    /// Atomically replace every hour slot the given buckets belong to.
    ///
    /// All existing rows of each slot are removed and the new rows inserted
    /// in one transaction; slots whose content is unchanged are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; nothing is changed then
    pub fn replace_hourly_usage(&mut self, buckets: Vec<HourlyUsage>) -> Result<ReplaceOutcome> {
        replace_partitions::<HourlyTable>(&mut self.conn, buckets)
            .context("Failed to replace hourly usage")
    }

    /// Helper function to parse `HourlyUsage` from a row selected with `HOURLY_COLUMNS`
    pub(crate) fn row_to_hourly_usage(row: &Row) -> rusqlite::Result<HourlyUsage> {
        Ok(HourlyUsage {
            date: parse_date(&row.get::<_, String>(0)?)?,
            hour: parse_hour(row.get(1)?)?,
            device_type: row.get(2)?,
            app_name: row.get(3)?,
            website_url: row.get(4)?,
            category: row.get(5)?,
            total_seconds: row.get(6)?,
            event_count: row.get(7)?,
            created_at: Some(parse_datetime(&row.get::<_, String>(8)?)?),
        })
    }
}
