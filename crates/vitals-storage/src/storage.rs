//! The storage capability and the backend factory.

use async_trait::async_trait;
use tracing::info;

use vitals_core::Metric;

use crate::config::StorageConfig;
use crate::error::StorageResult;
use crate::file::FileStorage;
use crate::sql::SqlStorage;

/// Operations every backend provides.
///
/// `put` accumulates counters and overwrites gauges. `get` fills the
/// payload of a lookup key in place.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn put(&self, metric: &Metric) -> StorageResult<()>;

    async fn get(&self, metric: &mut Metric) -> StorageResult<()>;

    async fn list(&self) -> StorageResult<Vec<Metric>>;

    /// Connectivity check; `None` when the backend has nothing to check.
    async fn ping(&self) -> Option<StorageResult<()>> {
        None
    }
}

/// The backend chosen at startup.
pub enum MetricStore {
    File(FileStorage),
    Sql(SqlStorage),
}

impl MetricStore {
    /// Open the backend selected by `config`.
    ///
    /// A non-empty database DSN selects SQL and a failed connection is an
    /// error. Otherwise the file backend is opened, restoring its snapshot
    /// when asked to.
    pub async fn open(config: &StorageConfig) -> StorageResult<Self> {
        match config.database_dsn.as_deref().filter(|dsn| !dsn.is_empty()) {
            Some(dsn) => {
                let sql = SqlStorage::connect(dsn).await?;
                info!("using postgres metric storage");
                Ok(MetricStore::Sql(sql))
            }
            None => {
                let file = FileStorage::open(
                    &config.store_file,
                    config.store_interval.is_zero(),
                    config.restore,
                )
                .await;
                info!(
                    path = %config.store_file.display(),
                    interval_secs = config.store_interval.as_secs(),
                    "using file metric storage"
                );
                Ok(MetricStore::File(file))
            }
        }
    }

    /// The file backend, when that is the one in use.
    pub fn as_file(&self) -> Option<&FileStorage> {
        match self {
            MetricStore::File(file) => Some(file),
            MetricStore::Sql(_) => None,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            MetricStore::File(_) => "file",
            MetricStore::Sql(_) => "postgres",
        }
    }

    /// Persist whatever is still only in memory.
    pub async fn flush(&self) -> StorageResult<()> {
        match self {
            MetricStore::File(file) => file.snapshot().await,
            MetricStore::Sql(_) => Ok(()),
        }
    }
}

#[async_trait]
impl Storage for MetricStore {
    async fn put(&self, metric: &Metric) -> StorageResult<()> {
        match self {
            MetricStore::File(s) => s.put(metric).await,
            MetricStore::Sql(s) => s.put(metric).await,
        }
    }

    async fn get(&self, metric: &mut Metric) -> StorageResult<()> {
        match self {
            MetricStore::File(s) => s.get(metric).await,
            MetricStore::Sql(s) => s.get(metric).await,
        }
    }

    async fn list(&self) -> StorageResult<Vec<Metric>> {
        match self {
            MetricStore::File(s) => s.list().await,
            MetricStore::Sql(s) => s.list().await,
        }
    }

    async fn ping(&self) -> Option<StorageResult<()>> {
        match self {
            MetricStore::File(s) => s.ping().await,
            MetricStore::Sql(s) => s.ping().await,
        }
    }
}
