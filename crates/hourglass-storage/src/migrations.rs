use anyhow::Result;
use rusqlite::Connection;

/// Initialize database schema
///
/// The `events` table is owned by the external producer; it is created here
/// too so that a fresh database can be aggregated (and tested) on its own.
///
/// # Errors
///
/// Returns an error if database table creation or index creation fails
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Events table - raw focus observations, append-only
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            device_type TEXT NOT NULL DEFAULT 'desktop',
            app_name TEXT NOT NULL,
            window_title TEXT,
            website_url TEXT,
            website_title TEXT,
            process_name TEXT,
            duration_seconds INTEGER NOT NULL DEFAULT 10,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    // Hourly usage - one row per (date, hour, device, app, url)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS hourly_usage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            hour INTEGER NOT NULL,
            device_type TEXT NOT NULL DEFAULT 'desktop',
            app_name TEXT NOT NULL,
            website_url TEXT,
            category TEXT NOT NULL,
            total_seconds INTEGER NOT NULL DEFAULT 0,
            event_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // Daily usage - one row per (date, device, app, url)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS daily_usage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            device_type TEXT NOT NULL DEFAULT 'desktop',
            app_name TEXT NOT NULL,
            website_url TEXT,
            category TEXT NOT NULL,
            total_seconds INTEGER NOT NULL DEFAULT 0,
            event_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // Daily category totals - derived from daily_usage
    conn.execute(
        "CREATE TABLE IF NOT EXISTS daily_category_usage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            device_type TEXT NOT NULL DEFAULT 'desktop',
            category TEXT NOT NULL,
            total_seconds INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // Mirror of the category rule file, for the reporting layer
    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            name TEXT PRIMARY KEY,
            color TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS app_categories (
            app_name TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    create_indexes(conn)?;

    Ok(())
}

/// Bucket keys are unique. A NULL url is part of the key, so the unique
/// indexes are built over `COALESCE(website_url, '')`.
fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
         CREATE UNIQUE INDEX IF NOT EXISTS uq_hourly ON hourly_usage(
             date, hour, device_type, app_name, COALESCE(website_url, ''));
         CREATE UNIQUE INDEX IF NOT EXISTS uq_daily ON daily_usage(
             date, device_type, app_name, COALESCE(website_url, ''));
         CREATE UNIQUE INDEX IF NOT EXISTS uq_daily_cat ON daily_category_usage(
             date, device_type, category);",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('events', 'hourly_usage', 'daily_usage',
                              'daily_category_usage', 'categories', 'app_categories')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 6);
    }

    #[test]
    fn test_hourly_key_unique_with_null_url() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let insert = "INSERT INTO hourly_usage
            (date, hour, device_type, app_name, website_url, category, total_seconds, event_count, created_at)
            VALUES ('2024-01-01', 10, 'desktop', 'firefox', NULL, 'Other', 1, 1, 'now')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
