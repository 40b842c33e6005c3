//! vitals-server — the metrics server binary.
//!
//! # Usage
//!
//! ```text
//! vitals-server -a 0.0.0.0:8080 --grpc-address 0.0.0.0:3200 -f /var/lib/vitals/metrics.json -i 300s
//! ```

use clap::Parser;
use tracing::{info, warn};

use vitals_server::{Cli, Server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = ServerConfig::load(&cli)?;
    info!(
        address = %config.address,
        grpc_address = config.grpc_address.as_deref().unwrap_or(""),
        "vitals server starting"
    );

    let server = Server::bind(config).await?;
    server.run(shutdown_signal()).await
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
