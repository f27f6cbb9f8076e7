use anyhow::Result;
use hourglass_storage::Database;
use thiserror::Error;

use crate::classifier::{CategoryResolver, CategorySnapshot};
use crate::config::PipelineConfig;
use crate::daily::{DailyAggregator, DailyPassReport};
use crate::hourly::{HourlyAggregator, HourlyPassReport};

/// A failed stage; later stages of the same cycle did not run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("hourly aggregation failed: {0:#}")]
    Hourly(anyhow::Error),
    #[error("daily aggregation failed: {0:#}")]
    Daily(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Running,
}

/// Summary of one completed cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub patterns: usize,
    pub hourly: HourlyPassReport,
    pub daily: DailyPassReport,
}

/// Runs category refresh, hourly aggregation and daily aggregation in order
pub struct Pipeline {
    database: Database,
    resolver: CategoryResolver,
    hourly: HourlyAggregator,
    daily: DailyAggregator,
    state: PipelineState,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        database: Database,
        resolver: CategoryResolver,
        hourly: HourlyAggregator,
        daily: DailyAggregator,
    ) -> Self {
        Self {
            database,
            resolver,
            hourly,
            daily,
            state: PipelineState::Idle,
        }
    }

    /// Open the configured database and rule file
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let database = Database::new(Some(config.db_path.clone()))?;
        Ok(Self::new(
            database,
            CategoryResolver::new(&config.categories_path),
            HourlyAggregator::new(config.hourly_lookback()),
            DailyAggregator::new(config.daily_lookback()),
        ))
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    #[must_use]
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// One incremental cycle
    ///
    /// # Errors
    ///
    /// Returns the first failing stage
    pub fn run_once(&mut self) -> Result<CycleReport, PipelineError> {
        self.cycle(false)
    }

    /// One cycle with both aggregators starting from the first stored row
    ///
    /// # Errors
    ///
    /// Returns the first failing stage
    pub fn backfill(&mut self) -> Result<CycleReport, PipelineError> {
        self.cycle(true)
    }

    fn cycle(&mut self, from_epoch: bool) -> Result<CycleReport, PipelineError> {
        self.state = PipelineState::Running;
        let result = self.run_stages(from_epoch);
        self.state = PipelineState::Idle;

        match &result {
            Ok(report) => log::info!(
                "Cycle complete: {} hourly and {} daily bucket(s)",
                report.hourly.buckets,
                report.daily.buckets
            ),
            Err(e) => log::error!("Cycle failed: {e}"),
        }
        result
    }

    fn run_stages(&mut self, from_epoch: bool) -> Result<CycleReport, PipelineError> {
        let categories = self.resolver.load();
        self.mirror_categories(&categories);

        let hourly = if from_epoch {
            self.hourly.backfill(&mut self.database, &categories)
        } else {
            self.hourly.run(&mut self.database, &categories)
        }
        .map_err(PipelineError::Hourly)?;

        let daily = if from_epoch {
            self.daily.backfill(&mut self.database, &categories)
        } else {
            self.daily.run(&mut self.database, &categories)
        }
        .map_err(PipelineError::Daily)?;

        Ok(CycleReport {
            patterns: categories.pattern_count(),
            hourly,
            daily,
        })
    }

    /// Copy the rule set into the reporting tables; not fatal
    fn mirror_categories(&mut self, categories: &CategorySnapshot) {
        if let Err(e) = self
            .database
            .sync_category_rules(categories.categories(), &categories.mappings())
        {
            log::warn!("Failed to mirror category rules: {e:#}");
        }
    }
}
