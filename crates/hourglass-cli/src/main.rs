mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hourglass_core::PipelineConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hourglass")]
#[command(about = "Roll raw app activity events into hourly and daily usage", long_about = None)]
struct Cli {
    /// Config file (defaults to config.toml in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Database path, overrides the config file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Category rule file, overrides the config file
    #[arg(long, global = true)]
    categories: Option<PathBuf>,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the aggregation pipeline
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
        /// Seconds between cycles, overrides the config file
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Re-aggregate all stored events from scratch
    Backfill,
    /// Show row counts and aggregation watermarks
    Status,
    /// Show which category an app name resolves to
    Classify {
        /// Application name as recorded in events
        app: String,
    },
    /// List the categories of the rule file
    Categories,
}

impl Cli {
    /// File config with command line overrides applied
    fn resolve_config(&self) -> Result<PipelineConfig> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => PipelineConfig::default_path()?,
        };
        let mut config = PipelineConfig::load(&path)?;

        if let Some(db) = &self.db {
            config.db_path.clone_from(db);
        }
        if let Some(categories) = &self.categories {
            config.categories_path.clone_from(categories);
        }
        if let Commands::Run {
            interval: Some(secs),
            ..
        } = self.command
        {
            config.interval_secs = secs;
        }

        config.validate()?;
        log::debug!("Resolved config: {config:?}");
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .init();

    let config = cli.resolve_config()?;

    match cli.command {
        Commands::Run { once, .. } => commands::run::handle_run(&config, once).await,
        Commands::Backfill => commands::run::handle_backfill(&config),
        Commands::Status => commands::inspect::handle_status(&config),
        Commands::Classify { app } => commands::inspect::handle_classify(&config, &app),
        Commands::Categories => commands::inspect::handle_categories(&config),
    }
}
