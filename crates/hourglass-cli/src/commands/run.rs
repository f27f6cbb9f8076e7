/// Pipeline command handlers (run, backfill)
use anyhow::Result;
use hourglass_core::{CycleReport, Pipeline, PipelineConfig, Scheduler};

use super::helpers::format_duration;

pub async fn handle_run(config: &PipelineConfig, once: bool) -> Result<()> {
    let mut pipeline = Pipeline::from_config(config)?;

    if once {
        let report = pipeline.run_once()?;
        print_cycle_report(&report);
        return Ok(());
    }

    println!(
        "Aggregating every {} (Ctrl-C to stop)",
        format_duration(config.interval().as_secs())
    );
    Scheduler::from_config(config)
        .run_forever(&mut pipeline)
        .await;
    Ok(())
}

pub fn handle_backfill(config: &PipelineConfig) -> Result<()> {
    let mut pipeline = Pipeline::from_config(config)?;
    let report = pipeline.backfill()?;
    print_cycle_report(&report);
    Ok(())
}

fn print_cycle_report(report: &CycleReport) {
    println!("Category patterns: {}", report.patterns);
    println!(
        "Hourly: {} event(s) since {}, {} bucket(s), {} of {} hour(s) rewritten",
        report.hourly.events,
        report.hourly.reprocess_from,
        report.hourly.buckets,
        report.hourly.outcome.rewritten,
        report.hourly.outcome.partitions
    );
    if report.hourly.rejected > 0 {
        println!("  Skipped {} malformed event row(s)", report.hourly.rejected);
    }
    println!(
        "Daily:  {} bucket(s) since {}, {} of {} day(s) rewritten",
        report.daily.buckets,
        report.daily.reprocess_from,
        report.daily.outcome.rewritten,
        report.daily.outcome.partitions
    );
}
