//! Database operations split into table-specific modules.
//!
//! This module re-exports the main Database struct and all its operations.

mod categories;
mod daily;
mod events;
pub mod helpers;
mod hourly;
pub mod replace;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::migrations;
use crate::models::TableStats;

pub use events::{EventScan, MAX_EVENT_DURATION_SECS};
pub use replace::ReplaceOutcome;

/// How long a statement waits on a lock held by the event producer
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection wrapper
pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    /// Open (or create) the database, using the default location when no
    /// path is given
    ///
    /// # Errors
    ///
    /// Returns an error if database directory creation, connection opening, or schema initialization fails
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = db_path.unwrap_or_else(Self::default_db_path);

        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(&path).context("Failed to open database connection")?;
        let db = Self::from_connection(conn)?;

        log::info!("Database initialized at: {}", path.display());
        Ok(db)
    }

    /// Open a database that must already exist; never creates the file
    ///
    /// # Errors
    ///
    /// Returns an error if there is no database at `path` or it cannot be opened
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.is_file() {
            anyhow::bail!("No database at {}", path.display());
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open database {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database with the full schema
    ///
    /// # Errors
    ///
    /// Returns an error if schema initialization fails
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set busy timeout")?;
        migrations::init_schema(&conn).context("Failed to initialize schema")?;
        Ok(Self { conn })
    }

    /// Get default database path
    #[must_use]
    pub fn default_db_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("hourglass");
        path.push("hourglass.db");
        path
    }

    // ==================== Diagnostics ====================

    /// Row counts and watermarks for `hourglass status`
    ///
    /// # Errors
    ///
    /// Returns an error if any of the count queries fail
    pub fn table_stats(&self) -> Result<TableStats> {
        let count = |table: &str| -> Result<i64> {
            let n = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .with_context(|| format!("Failed to count rows of {table}"))?;
            Ok(n)
        };

        let latest_event: Option<String> = self
            .conn
            .query_row("SELECT MAX(timestamp) FROM events", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(TableStats {
            events: count("events")?,
            hourly_rows: count("hourly_usage")?,
            daily_rows: count("daily_usage")?,
            daily_category_rows: count("daily_category_usage")?,
            latest_event,
            hourly_watermark: self.latest_hour_slot()?,
            daily_watermark: self.latest_daily_date()?,
        })
    }
}
