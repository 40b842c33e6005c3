//! Error types for the storage backends.

use std::path::PathBuf;

use thiserror::Error;
use vitals_core::MetricError;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("metric not found: {0}")]
    NotFound(String),

    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("unknown metric type: {0}")]
    UnknownMetricType(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("snapshot file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot encoding: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StorageError {
    /// Connection-level failures mean the database cannot be reached at all.
    fn from(e: sqlx::Error) -> Self {
        let unreachable = matches!(
            e,
            sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
        );
        if unreachable {
            StorageError::Unavailable(e.to_string())
        } else {
            StorageError::Database(e)
        }
    }
}

impl From<MetricError> for StorageError {
    fn from(e: MetricError) -> Self {
        match e {
            MetricError::UnknownMetricType(kind) => StorageError::UnknownMetricType(kind),
            MetricError::BadArgument(msg) => StorageError::BadArgument(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_failures_are_unavailable() {
        assert!(matches!(StorageError::from(sqlx::Error::PoolTimedOut), StorageError::Unavailable(_)));
        assert!(matches!(StorageError::from(sqlx::Error::PoolClosed), StorageError::Unavailable(_)));
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(StorageError::from(sqlx::Error::Io(refused)), StorageError::Unavailable(_)));
        assert!(matches!(StorageError::from(sqlx::Error::RowNotFound), StorageError::Database(_)));
    }
}
