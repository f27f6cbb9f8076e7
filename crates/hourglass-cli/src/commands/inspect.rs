/// Diagnostic command handlers (status, classify, categories)
use anyhow::Result;
use hourglass_core::classifier::ClassificationSource;
use hourglass_core::{CategoryResolver, PipelineConfig};
use hourglass_storage::Database;
use tabled::{Table, Tabled};

use super::helpers::{format_slot, truncate_str};

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "Table")]
    table: &'static str,
    #[tabled(rename = "Rows")]
    rows: i64,
    #[tabled(rename = "Watermark")]
    watermark: String,
}

#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "Category")]
    name: String,
    #[tabled(rename = "Color")]
    color: String,
    #[tabled(rename = "Patterns")]
    patterns: usize,
    #[tabled(rename = "Description")]
    description: String,
}

pub fn handle_status(config: &PipelineConfig) -> Result<()> {
    let db = Database::open_existing(&config.db_path)?;
    let stats = db.table_stats()?;
    let none = || String::from("-");

    let rows = vec![
        TableRow {
            table: "events",
            rows: stats.events,
            watermark: stats.latest_event.unwrap_or_else(none),
        },
        TableRow {
            table: "hourly_usage",
            rows: stats.hourly_rows,
            watermark: stats.hourly_watermark.map_or_else(none, format_slot),
        },
        TableRow {
            table: "daily_usage",
            rows: stats.daily_rows,
            watermark: stats
                .daily_watermark
                .map_or_else(none, |date| date.to_string()),
        },
        TableRow {
            table: "daily_category_usage",
            rows: stats.daily_category_rows,
            watermark: none(),
        },
    ];

    println!("Database: {}", config.db_path.display());
    println!("\n{}", Table::new(rows));
    Ok(())
}

pub fn handle_classify(config: &PipelineConfig, app: &str) -> Result<()> {
    let snapshot = CategoryResolver::new(&config.categories_path).load();
    let classification = snapshot.classify_full(app);

    println!("{app} -> {}", classification.category);
    match (classification.source, classification.pattern) {
        (ClassificationSource::Exact, Some(pattern)) => {
            println!("  Matched exact app name '{pattern}'");
        }
        (ClassificationSource::Substring, Some(pattern)) => {
            println!("  Matched pattern '{pattern}'");
        }
        _ => println!("  No rule matched"),
    }
    Ok(())
}

pub fn handle_categories(config: &PipelineConfig) -> Result<()> {
    let snapshot = CategoryResolver::new(&config.categories_path).load();
    let mappings = snapshot.mappings();

    let rows: Vec<CategoryRow> = snapshot
        .categories()
        .iter()
        .map(|category| CategoryRow {
            name: category.name.clone(),
            color: category.color.clone(),
            patterns: mappings
                .iter()
                .filter(|m| m.category == category.name)
                .count(),
            description: truncate_str(&category.description, 40),
        })
        .collect();

    println!("Rules: {}", config.categories_path.display());
    println!("\n{}", Table::new(rows));
    Ok(())
}
