//! Collector error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("cannot resolve own process: {0}")]
    Process(String),

    #[error("{0} statistics unavailable")]
    Unavailable(&'static str),
}

pub type CollectorResult<T> = Result<T, CollectorError>;
