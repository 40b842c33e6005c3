//! vitals-agent — the metrics agent binary.
//!
//! # Usage
//!
//! ```text
//! vitals-agent -a 127.0.0.1:8080 -p 2s -r 10s -k secret --crypto-key public.pem
//! ```

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use vitals_agent::{Agent, AgentConfig, Cli, GrpcSender, HttpSender, MetricSender};
use vitals_collector::Collector;
use vitals_core::{Encrypter, Signer};
use vitals_scheduler::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = AgentConfig::load(&cli)?;
    info!(
        address = %config.address,
        grpc_address = config.grpc_address.as_deref().unwrap_or(""),
        signed = !config.key.is_empty(),
        "vitals agent starting"
    );

    let sender: Arc<dyn MetricSender> = match &config.grpc_address {
        Some(addr) => {
            if config.crypto_key.is_some() {
                warn!("crypto key is ignored by the gRPC sender");
            }
            Arc::new(GrpcSender::connect_lazy(addr)?)
        }
        None => {
            let encrypter = match &config.crypto_key {
                Some(path) => Encrypter::from_pem_file(path)?,
                None => Encrypter::NoOp,
            };
            Arc::new(HttpSender::new(config.address.clone(), encrypter))
        }
    };

    let mut agent = Agent::new(
        Arc::new(Collector::new()),
        Signer::new(&config.key),
        sender,
        config.poll_interval,
        config.report_interval,
    );

    let token = CancellationToken::new();
    agent.start(&token)?;

    shutdown_signal().await;
    token.cancel();
    agent.stop().await?;

    info!("vitals agent stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,vitals=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolve on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("interrupt received"),
        _ = terminate => info!("terminate signal received"),
    }
}
