//! Backend selection settings.

use std::path::PathBuf;
use std::time::Duration;

/// Settings the server hands to [`MetricStore::open`](crate::MetricStore::open).
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Snapshot file of the file backend.
    pub store_file: PathBuf,
    /// Period of the snapshot job; zero writes a snapshot after every put.
    pub store_interval: Duration,
    /// Load the snapshot file at startup.
    pub restore: bool,
    /// PostgreSQL DSN; when set, the SQL backend is used.
    pub database_dsn: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_file: PathBuf::from("/tmp/devops-metrics-db.json"),
            store_interval: Duration::from_secs(300),
            restore: true,
            database_dsn: None,
        }
    }
}
