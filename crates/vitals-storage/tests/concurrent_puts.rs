//! Concurrency properties of the file backend.

use std::sync::Arc;

use quickcheck::{QuickCheck, TestResult};
use vitals_core::{Metric, MetricKind};
use vitals_storage::{FileStorage, Storage};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

#[test]
fn concurrent_counter_puts_sum_to_total() {
    fn inner(deltas: Vec<i64>) -> TestResult {
        if deltas.is_empty() {
            return TestResult::discard();
        }
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStorage::in_memory(&dir.path().join("m.json"), false));
        let expected = deltas.iter().fold(0i64, |acc, d| acc.wrapping_add(*d));

        let total = runtime().block_on(async {
            let tasks: Vec<_> = deltas
                .into_iter()
                .map(|delta| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move { store.put(&Metric::counter("Requests", delta)).await })
                })
                .collect();
            for task in tasks {
                task.await.unwrap().unwrap();
            }

            let mut m = Metric::query("Requests", MetricKind::Counter);
            store.get(&mut m).await.unwrap();
            m.delta
        });

        TestResult::from_bool(total == Some(expected))
    }
    QuickCheck::new()
        .tests(100)
        .max_tests(1000)
        .quickcheck(inner as fn(Vec<i64>) -> TestResult);
}

#[test]
fn concurrent_gauge_writers_leave_one_finite_value() {
    fn inner(values: Vec<f64>) -> TestResult {
        if values.is_empty() {
            return TestResult::discard();
        }
        // Always race a few values that must be turned away.
        let mut values = values;
        values.extend([f64::NAN, f64::INFINITY, f64::NEG_INFINITY]);
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        let store = Arc::new(FileStorage::in_memory(&path, false));

        let (stored, restored, rejections_ok) = runtime().block_on(async {
            let tasks: Vec<_> = values
                .iter()
                .copied()
                .map(|value| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move { (value, store.put(&Metric::gauge("Temp", value)).await) })
                })
                .collect();
            let mut rejections_ok = true;
            for task in tasks {
                let (value, result) = task.await.unwrap();
                rejections_ok &= result.is_ok() == value.is_finite();
            }

            let mut m = Metric::query("Temp", MetricKind::Gauge);
            let _ = store.get(&mut m).await;
            store.snapshot().await.unwrap();

            let reopened = FileStorage::open(&path, false, true).await;
            let mut r = Metric::query("Temp", MetricKind::Gauge);
            let _ = reopened.get(&mut r).await;
            (m.value, r.value, rejections_ok)
        });

        let stored_ok = match stored {
            Some(v) => finite.contains(&v),
            None => finite.is_empty(),
        };
        TestResult::from_bool(rejections_ok && stored_ok && restored == stored)
    }
    QuickCheck::new()
        .tests(100)
        .max_tests(1000)
        .quickcheck(inner as fn(Vec<f64>) -> TestResult);
}
