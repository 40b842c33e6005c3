//! PostgreSQL backend.
//!
//! Each write is a single upsert, so counter accumulation is atomic per row
//! without any in-process locking. `BIGINT` addition cannot wrap: a counter
//! that would overflow is rejected as a bad argument and keeps its value.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::debug;

use vitals_core::{Metric, MetricKind};

use crate::error::{StorageError, StorageResult};
use crate::storage::Storage;

const CREATE_COUNTER_TABLE: &str = "CREATE TABLE IF NOT EXISTS counter (
    name VARCHAR(128) PRIMARY KEY,
    value BIGINT NOT NULL
)";

const CREATE_GAUGE_TABLE: &str = "CREATE TABLE IF NOT EXISTS gauge (
    name VARCHAR(128) PRIMARY KEY,
    value DOUBLE PRECISION NOT NULL
)";

const UPSERT_COUNTER: &str = "INSERT INTO counter (name, value) VALUES ($1, $2)
    ON CONFLICT (name) DO UPDATE SET value = counter.value + EXCLUDED.value";

const UPSERT_GAUGE: &str = "INSERT INTO gauge (name, value) VALUES ($1, $2)
    ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value";

pub struct SqlStorage {
    pool: PgPool,
}

impl SqlStorage {
    /// Connect and make sure both tables exist.
    pub async fn connect(dsn: &str) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(5))
            .connect(dsn)
            .await?;
        Self::with_pool(pool).await
    }

    /// Use an existing pool; creates the tables if needed.
    pub async fn with_pool(pool: PgPool) -> StorageResult<Self> {
        sqlx::query(CREATE_COUNTER_TABLE).execute(&pool).await?;
        sqlx::query(CREATE_GAUGE_TABLE).execute(&pool).await?;
        debug!("metric tables ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl Storage for SqlStorage {
    async fn put(&self, metric: &Metric) -> StorageResult<()> {
        metric.check_payload()?;
        match (&metric.kind, metric.delta, metric.value) {
            (MetricKind::Counter, Some(delta), _) => {
                sqlx::query(UPSERT_COUNTER)
                    .bind(&metric.id)
                    .bind(delta)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| counter_error(e, &metric.id))?;
            }
            (MetricKind::Gauge, _, Some(value)) => {
                sqlx::query(UPSERT_GAUGE)
                    .bind(&metric.id)
                    .bind(value)
                    .execute(&self.pool)
                    .await?;
            }
            _ => return Err(StorageError::UnknownMetricType(metric.kind.to_string())),
        }
        Ok(())
    }

    async fn get(&self, metric: &mut Metric) -> StorageResult<()> {
        metric.kind.ensure_known()?;
        let found = match metric.kind {
            MetricKind::Counter => sqlx::query_scalar::<_, i64>("SELECT value FROM counter WHERE name = $1")
                .bind(&metric.id)
                .fetch_optional(&self.pool)
                .await?
                .map(|d| metric.delta = Some(d)),
            MetricKind::Gauge => sqlx::query_scalar::<_, f64>("SELECT value FROM gauge WHERE name = $1")
                .bind(&metric.id)
                .fetch_optional(&self.pool)
                .await?
                .map(|v| metric.value = Some(v)),
            MetricKind::Unknown(_) => None,
        };
        found.ok_or_else(|| StorageError::NotFound(metric.id.clone()))
    }

    async fn list(&self) -> StorageResult<Vec<Metric>> {
        let counters = sqlx::query("SELECT name, value FROM counter ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        let gauges = sqlx::query("SELECT name, value FROM gauge ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        let mut metrics = Vec::with_capacity(counters.len() + gauges.len());
        for row in counters {
            metrics.push(Metric::counter(row.try_get::<String, _>("name")?, row.try_get("value")?));
        }
        for row in gauges {
            metrics.push(Metric::gauge(row.try_get::<String, _>("name")?, row.try_get("value")?));
        }
        Ok(metrics)
    }

    async fn ping(&self) -> Option<StorageResult<()>> {
        let result = sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(StorageError::from);
        Some(result)
    }
}

/// SQLSTATE `numeric_value_out_of_range`.
const NUMERIC_OUT_OF_RANGE: &str = "22003";

fn counter_error(e: sqlx::Error, id: &str) -> StorageError {
    let overflow = e
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == NUMERIC_OUT_OF_RANGE);
    if overflow {
        StorageError::BadArgument(format!("counter '{id}' would overflow"))
    } else {
        e.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Needs a running PostgreSQL: DATABASE_URL=postgres://... cargo test -- --ignored
    async fn connect() -> SqlStorage {
        let dsn = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let storage = SqlStorage::connect(&dsn).await.unwrap();
        sqlx::query("TRUNCATE counter, gauge").execute(&storage.pool).await.unwrap();
        storage
    }

    #[tokio::test]
    #[ignore]
    async fn counter_accumulates_in_database() {
        let s = connect().await;
        s.put(&Metric::counter("Requests", 5)).await.unwrap();
        s.put(&Metric::counter("Requests", 7)).await.unwrap();

        let mut m = Metric::query("Requests", MetricKind::Counter);
        s.get(&mut m).await.unwrap();
        assert_eq!(m.delta, Some(12));
    }

    #[tokio::test]
    #[ignore]
    async fn counter_overflow_is_bad_argument_in_database() {
        let s = connect().await;
        s.put(&Metric::counter("Big", i64::MAX)).await.unwrap();
        let err = s.put(&Metric::counter("Big", 1)).await.unwrap_err();
        assert!(matches!(err, StorageError::BadArgument(_)), "{err}");

        let mut m = Metric::query("Big", MetricKind::Counter);
        s.get(&mut m).await.unwrap();
        assert_eq!(m.delta, Some(i64::MAX));
    }

    #[tokio::test]
    #[ignore]
    async fn gauge_overwrites_in_database() {
        let s = connect().await;
        s.put(&Metric::gauge("Temp", 36.6)).await.unwrap();
        s.put(&Metric::gauge("Temp", 37.1)).await.unwrap();

        let mut m = Metric::query("Temp", MetricKind::Gauge);
        s.get(&mut m).await.unwrap();
        assert_eq!(m.value, Some(37.1));
        assert_eq!(s.list().await.unwrap(), vec![Metric::gauge("Temp", 37.1)]);
    }

    #[tokio::test]
    #[ignore]
    async fn missing_row_is_not_found_and_ping_answers() {
        let s = connect().await;
        let mut m = Metric::query("Nope", MetricKind::Counter);
        assert!(matches!(s.get(&mut m).await, Err(StorageError::NotFound(_))));
        assert!(matches!(s.ping().await, Some(Ok(()))));
    }
}
