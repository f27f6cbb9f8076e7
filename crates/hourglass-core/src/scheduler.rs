use std::future::Future;
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::pipeline::Pipeline;

/// Retry delays after consecutive failed cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
}

impl Backoff {
    #[must_use]
    pub const fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Delay before the next attempt after `failures` consecutive failures:
    /// `min(initial * 2^(failures - 1), max)`
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.checked_pow(failures - 1).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

/// Drives a pipeline on a fixed interval
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    backoff: Backoff,
    failures: u32,
}

impl Scheduler {
    #[must_use]
    pub const fn new(interval: Duration, backoff: Backoff) -> Self {
        Self {
            interval,
            backoff,
            failures: 0,
        }
    }

    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.interval(),
            Backoff::new(
                Duration::from_secs(config.retry_initial_secs),
                Duration::from_secs(config.retry_max_secs),
            ),
        )
    }

    /// Consecutive failed cycles so far
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Wait before the next cycle: the regular interval, or the backoff
    /// delay while cycles keep failing
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        if self.failures == 0 {
            self.interval
        } else {
            self.backoff.delay(self.failures)
        }
    }

    fn record(&mut self, succeeded: bool) {
        if succeeded {
            if self.failures > 0 {
                log::info!("Pipeline recovered after {} failed cycle(s)", self.failures);
            }
            self.failures = 0;
        } else {
            self.failures = self.failures.saturating_add(1);
        }
    }

    /// Run cycles until Ctrl-C
    pub async fn run_forever(&mut self, pipeline: &mut Pipeline) {
        self.run_until(pipeline, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
            log::info!("Received Ctrl-C, shutting down...");
        })
        .await;
    }

    /// Run a cycle immediately, then one per delay, until `shutdown` resolves.
    /// A cycle in progress always completes before shutdown is observed.
    pub async fn run_until<F>(&mut self, pipeline: &mut Pipeline, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        log::info!("Scheduler started (interval {}s)", self.interval.as_secs());

        loop {
            let succeeded = pipeline.run_once().is_ok();
            self.record(succeeded);

            let delay = self.next_delay();
            if !succeeded {
                log::warn!(
                    "Retrying in {}s ({} consecutive failure(s))",
                    delay.as_secs(),
                    self.failures
                );
            }

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = &mut shutdown => break,
            }
        }

        log::info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::CategoryResolver;
    use crate::daily::DailyAggregator;
    use crate::hourly::HourlyAggregator;
    use chrono::NaiveDateTime;
    use hourglass_storage::{Database, Event};

    fn backoff() -> Backoff {
        Backoff::new(Duration::from_secs(30), Duration::from_secs(900))
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let backoff = backoff();
        assert_eq!(backoff.delay(1), Duration::from_secs(30));
        assert_eq!(backoff.delay(2), Duration::from_secs(60));
        assert_eq!(backoff.delay(3), Duration::from_secs(120));
        assert_eq!(backoff.delay(5), Duration::from_secs(480));
        assert_eq!(backoff.delay(6), Duration::from_secs(900));
        assert_eq!(backoff.delay(40), Duration::from_secs(900));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(900));
    }

    #[test]
    fn test_success_resets_delay() {
        let mut scheduler = Scheduler::new(Duration::from_secs(300), backoff());
        assert_eq!(scheduler.next_delay(), Duration::from_secs(300));

        scheduler.record(false);
        scheduler.record(false);
        assert_eq!(scheduler.failures(), 2);
        assert_eq!(scheduler.next_delay(), Duration::from_secs(60));

        scheduler.record(true);
        assert_eq!(scheduler.failures(), 0);
        assert_eq!(scheduler.next_delay(), Duration::from_secs(300));
    }

    #[test]
    fn test_from_config() {
        let config = PipelineConfig {
            interval_secs: 60,
            retry_initial_secs: 5,
            retry_max_secs: 20,
            ..PipelineConfig::default()
        };
        let scheduler = Scheduler::from_config(&config);
        assert_eq!(scheduler.next_delay(), Duration::from_secs(60));
        assert_eq!(scheduler.backoff.delay(4), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_run_until_runs_first_cycle_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open_in_memory().unwrap();
        database
            .insert_event(&Event::new(
                NaiveDateTime::parse_from_str("2024-01-01T10:05:00", "%Y-%m-%dT%H:%M:%S")
                    .unwrap(),
                "firefox",
                30,
            ))
            .unwrap();
        let mut pipeline = Pipeline::new(
            database,
            CategoryResolver::new(dir.path().join("rules.json")),
            HourlyAggregator::new(chrono::Duration::hours(2)),
            DailyAggregator::new(chrono::Duration::days(1)),
        );

        let mut scheduler = Scheduler::new(Duration::from_secs(3600), backoff());
        scheduler
            .run_until(&mut pipeline, tokio::time::sleep(Duration::from_millis(20)))
            .await;

        assert_eq!(scheduler.failures(), 0);
        let stats = pipeline.database().table_stats().unwrap();
        assert_eq!(stats.hourly_rows, 1);
        assert_eq!(stats.daily_rows, 1);
        assert_eq!(stats.daily_category_rows, 1);
    }
}
