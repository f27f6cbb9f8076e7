use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::params;

use super::Database;
use crate::models::{AppCategory, CategoryRecord};

impl Database {
    // ==================== Category Mirror Methods ====================

    /// Replace the `categories` and `app_categories` tables with the given
    /// rule set, in one transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails
    pub fn sync_category_rules(
        &mut self,
        categories: &[CategoryRecord],
        mappings: &[AppCategory],
    ) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM categories", [])?;
        tx.execute("DELETE FROM app_categories", [])?;

        for category in categories {
            tx.execute(
                "INSERT OR REPLACE INTO categories (name, color, description, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    category.name,
                    category.color,
                    category.description,
                    updated_at
                ],
            )?;
        }

        for mapping in mappings {
            tx.execute(
                "INSERT OR REPLACE INTO app_categories (app_name, category, updated_at)
                 VALUES (?1, ?2, ?3)",
                params![mapping.app_name, mapping.category, updated_at],
            )?;
        }

        tx.commit().context("Failed to commit category mirror")?;
        log::debug!(
            "Mirrored {} categories and {} app mappings",
            categories.len(),
            mappings.len()
        );
        Ok(())
    }

    /// Mirrored categories, by name
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_categories(&self) -> Result<Vec<CategoryRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, color, description FROM categories ORDER BY name")?;

        let categories = stmt
            .query_map([], |row| {
                Ok(CategoryRecord {
                    name: row.get(0)?,
                    color: row.get(1)?,
                    description: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(categories)
    }

    /// Mirrored app mappings, by app name
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_app_categories(&self) -> Result<Vec<AppCategory>> {
        let mut stmt = self
            .conn
            .prepare("SELECT app_name, category FROM app_categories ORDER BY app_name")?;

        let mappings = stmt
            .query_map([], |row| {
                Ok(AppCategory {
                    app_name: row.get(0)?,
                    category: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(mappings)
    }
}
