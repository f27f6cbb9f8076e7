pub mod classifier;
pub mod config;
pub mod daily;
pub mod hourly;
pub mod pipeline;
pub mod scheduler;

pub use classifier::{CategoryResolver, CategorySnapshot};
pub use config::PipelineConfig;
pub use pipeline::{CycleReport, Pipeline, PipelineError};
pub use scheduler::{Backoff, Scheduler};
