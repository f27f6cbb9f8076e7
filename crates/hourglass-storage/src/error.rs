use thiserror::Error;

/// Reasons an `events` row is refused at the aggregation boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventRowError {
    #[error("unparseable timestamp {0:?}")]
    InvalidTimestamp(String),
    #[error("negative duration {0}s")]
    NegativeDuration(i64),
    #[error("duration {0}s is longer than one day")]
    DurationTooLong(i64),
    #[error("duration is not an integer: {0}")]
    InvalidDuration(String),
    #[error("empty app name")]
    EmptyAppName,
}

/// An `events` row that failed validation, with enough context to find it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("events row id={id} (timestamp {raw_timestamp:?}): {reason}")]
pub struct RejectedEvent {
    pub id: i64,
    pub raw_timestamp: String,
    pub reason: EventRowError,
}
