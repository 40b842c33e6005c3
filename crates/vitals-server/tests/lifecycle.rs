//! Full server runs: agent senders in, gRPC reads out, snapshot on the way
//! down and restore on the way back up.

use std::path::Path;
use std::time::Duration;

use tokio::sync::oneshot;

use vitals_agent::{GrpcSender, HttpSender, MetricSender};
use vitals_core::{Encrypter, Metric, MetricKind};
use vitals_grpc::GrpcClient;
use vitals_server::{Server, ServerConfig};
use vitals_storage::StorageConfig;

struct Running {
    http: String,
    grpc: String,
    stop: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl Running {
    async fn shutdown(self) {
        let _ = self.stop.send(());
        self.task.await.unwrap().unwrap();
    }
}

fn config(store_file: &Path, store_interval: Duration, restore: bool) -> ServerConfig {
    ServerConfig {
        address: "127.0.0.1:0".to_string(),
        grpc_address: Some("127.0.0.1:0".to_string()),
        key: String::new(),
        crypto_key: None,
        trusted_subnet: None,
        storage: StorageConfig {
            store_file: store_file.to_path_buf(),
            store_interval,
            restore,
            database_dsn: None,
        },
        shutdown_grace: Duration::from_secs(2),
    }
}

async fn start(config: ServerConfig) -> Running {
    let server = Server::bind(config).await.unwrap();
    let http = server.http_addr().unwrap().to_string();
    let grpc = server.grpc_addr().unwrap().unwrap().to_string();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.run(async move {
        let _ = stopped.await;
    }));
    Running { http, grpc, stop, task }
}

async fn read_counter(addr: &str, id: &str) -> Option<i64> {
    let client = GrpcClient::connect_lazy(addr).unwrap();
    client
        .get_metric(&Metric::query(id, MetricKind::Counter))
        .await
        .ok()
        .and_then(|m| m.delta)
}

#[tokio::test]
async fn both_transports_share_one_store() {
    let dir = tempfile::tempdir().unwrap();
    let running = start(config(&dir.path().join("m.json"), Duration::from_secs(300), false)).await;

    let http = HttpSender::new(running.http.clone(), Encrypter::NoOp);
    http.send(&[Metric::counter("Requests", 5)]).await.unwrap();
    let grpc = GrpcSender::connect_lazy(&running.grpc).unwrap();
    grpc.send(&[Metric::counter("Requests", 7)]).await.unwrap();

    assert_eq!(read_counter(&running.grpc, "Requests").await, Some(12));
    running.shutdown().await;
}

#[tokio::test]
async fn shutdown_snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("m.json");

    let running = start(config(&file, Duration::from_secs(300), false)).await;
    HttpSender::new(running.http.clone(), Encrypter::NoOp)
        .send(&[Metric::counter("PollCount", 3), Metric::gauge("Alloc", 2048.0)])
        .await
        .unwrap();
    running.shutdown().await;

    let snapshot: serde_json::Value = serde_json::from_slice(&std::fs::read(&file).unwrap()).unwrap();
    assert_eq!(snapshot["counters"]["PollCount"], 3);
    assert_eq!(snapshot["gauges"]["Alloc"], 2048.0);

    let restored = start(config(&file, Duration::from_secs(300), true)).await;
    assert_eq!(read_counter(&restored.grpc, "PollCount").await, Some(3));
    restored.shutdown().await;

    let fresh = start(config(&file, Duration::from_secs(300), false)).await;
    assert_eq!(read_counter(&fresh.grpc, "PollCount").await, None);
    fresh.shutdown().await;
}

#[tokio::test]
async fn snapshot_job_writes_periodically() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("m.json");
    let running = start(config(&file, Duration::from_millis(50), false)).await;

    HttpSender::new(running.http.clone(), Encrypter::NoOp)
        .send(&[Metric::counter("Requests", 1)])
        .await
        .unwrap();

    let mut written = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(25)).await;
        if std::fs::read_to_string(&file).is_ok_and(|s| s.contains("Requests")) {
            written = true;
            break;
        }
    }
    assert!(written, "snapshot job never wrote the file");
    running.shutdown().await;
}

#[tokio::test]
async fn unreachable_database_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir.path().join("m.json"), Duration::from_secs(300), false);
    config.storage.database_dsn = Some("postgres://nobody@127.0.0.1:1/none".to_string());

    let server = Server::bind(config).await.unwrap();
    assert!(server.run(std::future::pending()).await.is_err());
}
