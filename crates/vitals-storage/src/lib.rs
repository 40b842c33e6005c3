//! vitals-storage — where reported metrics live.
//!
//! Counters accumulate the deltas they receive; gauges keep the last value
//! written. Two backends implement the [`Storage`] capability:
//!
//! - [`FileStorage`]: maps in memory, persisted as a JSON snapshot file
//! - [`SqlStorage`]: PostgreSQL tables, one upsert per write
//!
//! [`MetricStore::open`] picks one from a [`StorageConfig`]: a database DSN
//! selects SQL, otherwise the file backend is used.

pub mod config;
pub mod error;
pub mod file;
pub mod sql;
pub mod storage;

pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use file::FileStorage;
pub use sql::SqlStorage;
pub use storage::{MetricStore, Storage};
