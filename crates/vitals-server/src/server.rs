//! Server wiring: storage, snapshot job, HTTP and gRPC listeners, and the
//! shutdown sequence.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use vitals_api::{ApiState, build_router};
use vitals_core::{Decrypter, Signer};
use vitals_grpc::MetricsService;
use vitals_scheduler::{CancellationToken, Scheduler};
use vitals_storage::MetricStore;

use crate::config::ServerConfig;

/// Bound listeners plus the settings to run them with.
pub struct Server {
    config: ServerConfig,
    http: TcpListener,
    grpc: Option<TcpListener>,
}

impl Server {
    /// Bind the HTTP listener and, when configured, the gRPC one.
    pub async fn bind(config: ServerConfig) -> anyhow::Result<Self> {
        let http = TcpListener::bind(&config.address)
            .await
            .with_context(|| format!("failed to bind HTTP address {}", config.address))?;
        let grpc = match &config.grpc_address {
            Some(addr) => Some(
                TcpListener::bind(addr)
                    .await
                    .with_context(|| format!("failed to bind gRPC address {addr}"))?,
            ),
            None => None,
        };
        Ok(Self { config, http, grpc })
    }

    pub fn http_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.http.local_addr()?)
    }

    pub fn grpc_addr(&self) -> anyhow::Result<Option<SocketAddr>> {
        self.grpc
            .as_ref()
            .map(|l| l.local_addr())
            .transpose()
            .map_err(Into::into)
    }

    /// Serve until `shutdown` resolves, then stop in order: scheduled jobs,
    /// listeners (bounded by the grace period), and a final snapshot.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        let Self { config, http, grpc } = self;

        // ── Storage and message protection ─────────────────────────

        let store = Arc::new(
            MetricStore::open(&config.storage)
                .await
                .context("failed to open metric storage")?,
        );
        let signer = Signer::new(&config.key);
        let decrypter = match &config.crypto_key {
            Some(path) => Decrypter::from_pem_file(path).context("failed to load private key")?,
            None => Decrypter::NoOp,
        };
        info!(
            backend = store.backend_name(),
            signed = signer.is_enabled(),
            encrypted = config.crypto_key.is_some(),
            "metric storage ready"
        );

        // ── Snapshot job ───────────────────────────────────────────

        let token = CancellationToken::new();
        let mut scheduler = Scheduler::new();
        if store.as_file().is_some() && !config.storage.store_interval.is_zero() {
            let snapshot_store = Arc::clone(&store);
            scheduler.add(
                &token,
                move || {
                    let store = Arc::clone(&snapshot_store);
                    async move {
                        match store.flush().await {
                            Ok(()) => debug!("metric snapshot written"),
                            Err(e) => warn!(error = %e, "failed to write metric snapshot"),
                        }
                    }
                },
                config.storage.store_interval,
            )?;
            info!(interval_secs = config.storage.store_interval.as_secs(), "snapshot job scheduled");
        }

        // ── Listeners ──────────────────────────────────────────────

        let router = build_router(
            ApiState::new(store.clone(), signer.clone(), decrypter),
            config.trusted_subnet,
        );
        let http_addr = http.local_addr()?;
        let http_token = token.clone();
        let mut http_task: JoinHandle<anyhow::Result<()>> = tokio::spawn(async move {
            axum::serve(http, router)
                .with_graceful_shutdown(async move { http_token.cancelled().await })
                .await?;
            Ok(())
        });
        info!(addr = %http_addr, trusted_subnet = ?config.trusted_subnet.map(|s| s.to_string()), "HTTP server listening");

        let grpc_task: Option<JoinHandle<anyhow::Result<()>>> = grpc.map(|listener| {
            let service = MetricsService::new(store.clone(), signer.clone());
            let grpc_token = token.clone();
            tokio::spawn(async move {
                vitals_grpc::serve(listener, service, async move { grpc_token.cancelled().await }).await?;
                Ok(())
            })
        });

        // ── Wait for shutdown ──────────────────────────────────────

        let mut failure = None;
        tokio::select! {
            _ = shutdown => info!("shutdown requested"),
            result = &mut http_task => {
                error!("HTTP server exited unexpectedly");
                failure = Some(flatten(result).err().unwrap_or_else(|| anyhow::anyhow!("HTTP server exited")));
            }
        }

        token.cancel();
        if let Err(e) = scheduler.stop().await {
            warn!(error = %e, "scheduled job ended abnormally");
        }

        let grace = config.shutdown_grace;
        let http_abort = http_task.abort_handle();
        let grpc_abort = grpc_task.as_ref().map(|t| t.abort_handle());
        let drained = tokio::time::timeout(grace, async {
            if failure.is_none() {
                if let Err(e) = flatten(http_task.await) {
                    warn!(error = %e, "HTTP server stopped with error");
                }
            }
            if let Some(task) = grpc_task {
                if let Err(e) = flatten(task.await) {
                    warn!(error = %e, "gRPC server stopped with error");
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(grace_secs = grace.as_secs(), "grace period elapsed; dropping open connections");
            http_abort.abort();
            if let Some(abort) = grpc_abort {
                abort.abort();
            }
        }

        store.flush().await.context("failed to write final metric snapshot")?;
        info!("vitals server stopped");

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn flatten(result: Result<anyhow::Result<()>, tokio::task::JoinError>) -> anyhow::Result<()> {
    result.context("server task panicked")?
}
