//! Server configuration: command line over environment over TOML file over
//! built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use serde::Deserialize;

use vitals_api::TrustedSubnet;
use vitals_core::parse_duration;
use vitals_storage::StorageConfig;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "vitals-server", version, about = "Collect metrics reported by vitals agents")]
pub struct Cli {
    /// HTTP listen address.
    #[arg(short = 'a', long, env = "ADDRESS")]
    pub address: Option<String>,

    /// gRPC listen address; the gRPC server is disabled when empty.
    #[arg(long, env = "GRPC_ADDRESS")]
    pub grpc_address: Option<String>,

    /// HMAC key for metric digests.
    #[arg(short = 'k', long, env = "KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// PEM private key used to decrypt request bodies.
    #[arg(long = "crypto-key", env = "CRYPTO_KEY")]
    pub crypto_key: Option<PathBuf>,

    /// Only accept requests whose X-Real-IP is inside this CIDR.
    #[arg(short = 't', long, env = "TRUSTED_SUBNET")]
    pub trusted_subnet: Option<String>,

    /// Snapshot file of the file backend.
    #[arg(short = 'f', long, env = "STORE_FILE")]
    pub store_file: Option<PathBuf>,

    /// Snapshot period; `0` writes after every update.
    #[arg(short = 'i', long, env = "STORE_INTERVAL", value_parser = parse_duration)]
    pub store_interval: Option<Duration>,

    /// Load the snapshot file at startup.
    #[arg(short = 'r', long, env = "RESTORE", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub restore: Option<bool>,

    /// PostgreSQL DSN; selects the database backend.
    #[arg(short = 'd', long, env = "DATABASE_DSN", hide_env_values = true)]
    pub database_dsn: Option<String>,

    /// How long in-flight requests may take once shutdown starts.
    #[arg(long, env = "SHUTDOWN_GRACE", value_parser = parse_duration)]
    pub shutdown_grace: Option<Duration>,

    /// TOML configuration file.
    #[arg(short = 'c', long, env = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines.
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

/// Keys accepted in the TOML file. Durations are strings like `"300s"`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub address: Option<String>,
    pub grpc_address: Option<String>,
    pub key: Option<String>,
    pub crypto_key: Option<PathBuf>,
    pub trusted_subnet: Option<String>,
    pub store_file: Option<PathBuf>,
    pub store_interval: Option<String>,
    pub restore: Option<bool>,
    pub database_dsn: Option<String>,
    pub shutdown_grace: Option<String>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Fully resolved server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub grpc_address: Option<String>,
    pub key: String,
    pub crypto_key: Option<PathBuf>,
    pub trusted_subnet: Option<TrustedSubnet>,
    pub storage: StorageConfig,
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    /// Resolve the command line, reading the file it names if any.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file)
    }

    pub fn resolve(cli: &Cli, file: FileConfig) -> anyhow::Result<Self> {
        let defaults = StorageConfig::default();

        let store_interval = match cli.store_interval {
            Some(d) => d,
            None => file_duration(file.store_interval.as_deref(), "store_interval")?.unwrap_or(defaults.store_interval),
        };
        let shutdown_grace = match cli.shutdown_grace {
            Some(d) => d,
            None => file_duration(file.shutdown_grace.as_deref(), "shutdown_grace")?.unwrap_or(DEFAULT_SHUTDOWN_GRACE),
        };

        let trusted_subnet = cli
            .trusted_subnet
            .clone()
            .or(file.trusted_subnet)
            .filter(|cidr| !cidr.is_empty())
            .map(|cidr| {
                cidr.parse::<TrustedSubnet>()
                    .map_err(|e| anyhow::anyhow!("trusted_subnet: {e}"))
            })
            .transpose()?;

        Ok(Self {
            address: cli
                .address
                .clone()
                .or(file.address)
                .unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            grpc_address: cli
                .grpc_address
                .clone()
                .or(file.grpc_address)
                .filter(|addr| !addr.is_empty()),
            key: cli.key.clone().or(file.key).unwrap_or_default(),
            crypto_key: cli
                .crypto_key
                .clone()
                .or(file.crypto_key)
                .filter(|path| !path.as_os_str().is_empty()),
            trusted_subnet,
            storage: StorageConfig {
                store_file: cli.store_file.clone().or(file.store_file).unwrap_or(defaults.store_file),
                store_interval,
                restore: cli.restore.or(file.restore).unwrap_or(defaults.restore),
                database_dsn: cli
                    .database_dsn
                    .clone()
                    .or(file.database_dsn)
                    .filter(|dsn| !dsn.is_empty()),
            },
            shutdown_grace,
        })
    }
}

fn file_duration(value: Option<&str>, field: &str) -> anyhow::Result<Option<Duration>> {
    value
        .map(|v| parse_duration(v).map_err(|e| anyhow::anyhow!("{field}: {e}")))
        .transpose()
}
