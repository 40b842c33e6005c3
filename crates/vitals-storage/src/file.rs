//! File backend: metrics in memory, persisted as a JSON snapshot.
//!
//! The snapshot is written to `<file>.tmp` and renamed over the target, so a
//! crash mid-write leaves the previous snapshot intact. Restoring accepts
//! both the current field names (`counters`/`gauges`) and the older
//! `Integers`/`Floats`.
//!
//! Counters add with wrap-around. The SQL backend rejects overflow instead.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use vitals_core::{Metric, MetricKind};

use crate::error::{StorageError, StorageResult};
use crate::storage::Storage;

/// The persisted form of the store.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default, alias = "Integers")]
    counters: BTreeMap<String, i64>,
    #[serde(default, alias = "Floats")]
    gauges: BTreeMap<String, f64>,
}

pub struct FileStorage {
    data: RwLock<Snapshot>,
    path: PathBuf,
    /// Snapshot after every successful put.
    sync: bool,
    /// Serializes snapshot writers so the temp file has one owner.
    writer: Mutex<()>,
}

impl FileStorage {
    /// Create the store, restoring `path` first when `restore` is set.
    ///
    /// A missing or unreadable snapshot is logged and the store starts empty.
    pub async fn open(path: &Path, sync: bool, restore: bool) -> Self {
        let storage = Self::in_memory(path, sync);
        if restore {
            if let Err(e) = storage.restore().await {
                warn!(path = %path.display(), error = %e, "failed to restore metric snapshot");
            }
        }
        storage
    }

    /// An empty store that snapshots to `path` but does not read it.
    pub fn in_memory(path: &Path, sync: bool) -> Self {
        Self {
            data: RwLock::new(Snapshot::default()),
            path: path.to_path_buf(),
            sync,
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_sync(&self) -> bool {
        self.sync
    }

    /// Replace the in-memory maps with the contents of the snapshot file.
    pub async fn restore(&self) -> StorageResult<()> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| StorageError::Io {
                path: self.path.clone(),
                source,
            })?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;

        let (counters, gauges) = (snapshot.counters.len(), snapshot.gauges.len());
        *self.data.write().await = snapshot;
        info!(path = %self.path.display(), counters, gauges, "metric snapshot restored");
        Ok(())
    }

    /// Write the current maps to the snapshot file.
    pub async fn snapshot(&self) -> StorageResult<()> {
        let _writer = self.writer.lock().await;

        let bytes = {
            let data = self.data.read().await;
            serde_json::to_vec(&*data)?
        };

        let tmp = tmp_path(&self.path);
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        tokio::fs::write(&tmp, &bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "metric snapshot written");
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn put(&self, metric: &Metric) -> StorageResult<()> {
        metric.check_payload()?;
        {
            let mut data = self.data.write().await;
            match (&metric.kind, metric.delta, metric.value) {
                (MetricKind::Counter, Some(delta), _) => {
                    let stored = data.counters.entry(metric.id.clone()).or_insert(0);
                    *stored = stored.wrapping_add(delta);
                }
                (MetricKind::Gauge, _, Some(value)) => {
                    data.gauges.insert(metric.id.clone(), value);
                }
                _ => return Err(StorageError::UnknownMetricType(metric.kind.to_string())),
            }
        }

        if self.sync {
            if let Err(e) = self.snapshot().await {
                warn!(error = %e, "synchronous snapshot failed");
            }
        }
        Ok(())
    }

    async fn get(&self, metric: &mut Metric) -> StorageResult<()> {
        metric.kind.ensure_known()?;
        let data = self.data.read().await;
        let found = match metric.kind {
            MetricKind::Counter => data.counters.get(&metric.id).map(|d| metric.delta = Some(*d)),
            MetricKind::Gauge => data.gauges.get(&metric.id).map(|v| metric.value = Some(*v)),
            MetricKind::Unknown(_) => None,
        };
        found.ok_or_else(|| StorageError::NotFound(metric.id.clone()))
    }

    async fn list(&self) -> StorageResult<Vec<Metric>> {
        let data = self.data.read().await;
        let counters = data.counters.iter().map(|(id, d)| Metric::counter(id.as_str(), *d));
        let gauges = data.gauges.iter().map(|(id, v)| Metric::gauge(id.as_str(), *v));
        Ok(counters.chain(gauges).collect())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
