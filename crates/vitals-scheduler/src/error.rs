//! Scheduler error types.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("job interval must be positive, got {0:?}")]
    ZeroInterval(Duration),

    #[error("job task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
