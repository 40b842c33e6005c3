//! Agent configuration: command line over environment over TOML file over
//! built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

use vitals_core::parse_duration;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "vitals-agent", version, about = "Report process and host metrics to a vitals server")]
pub struct Cli {
    /// HTTP address of the server.
    #[arg(short = 'a', long, env = "ADDRESS")]
    pub address: Option<String>,

    /// gRPC address of the server; selects the gRPC sender when set.
    #[arg(long, env = "GRPC_ADDRESS")]
    pub grpc_address: Option<String>,

    /// HMAC key for metric digests.
    #[arg(short = 'k', long, env = "KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// PEM public key used to encrypt report bodies.
    #[arg(long = "crypto-key", env = "CRYPTO_KEY")]
    pub crypto_key: Option<PathBuf>,

    /// How often to sample metrics (e.g. `2s`, `500ms`).
    #[arg(short = 'p', long, env = "POLL_INTERVAL", value_parser = parse_duration)]
    pub poll_interval: Option<Duration>,

    /// How often to send a batch to the server.
    #[arg(short = 'r', long, env = "REPORT_INTERVAL", value_parser = parse_duration)]
    pub report_interval: Option<Duration>,

    /// TOML configuration file.
    #[arg(short = 'c', long, env = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines.
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

/// Keys accepted in the TOML file. Durations are strings like `"10s"`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub address: Option<String>,
    pub grpc_address: Option<String>,
    pub key: Option<String>,
    pub crypto_key: Option<PathBuf>,
    pub poll_interval: Option<String>,
    pub report_interval: Option<String>,
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

/// Fully resolved agent settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub address: String,
    pub grpc_address: Option<String>,
    pub key: String,
    pub crypto_key: Option<PathBuf>,
    pub poll_interval: Duration,
    pub report_interval: Duration,
}

impl AgentConfig {
    /// Resolve the command line, reading the file it names if any.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file)
    }

    pub fn resolve(cli: &Cli, file: FileConfig) -> anyhow::Result<Self> {
        let poll_interval = match cli.poll_interval {
            Some(d) => d,
            None => file_duration(file.poll_interval.as_deref(), "poll_interval")?.unwrap_or(DEFAULT_POLL_INTERVAL),
        };
        let report_interval = match cli.report_interval {
            Some(d) => d,
            None => {
                file_duration(file.report_interval.as_deref(), "report_interval")?.unwrap_or(DEFAULT_REPORT_INTERVAL)
            }
        };
        if poll_interval.is_zero() || report_interval.is_zero() {
            anyhow::bail!("poll and report intervals must be greater than zero");
        }

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
            poll_interval,
            report_interval,
        })
    }
}

fn file_duration(value: Option<&str>, field: &str) -> anyhow::Result<Option<Duration>> {
    value
        .map(|v| parse_duration(v).map_err(|e| anyhow::anyhow!("{field}: {e}")))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["vitals-agent"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let config = AgentConfig::resolve(&cli(&[]), FileConfig::default()).unwrap();
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.grpc_address, None);
        assert_eq!(config.key, "");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.report_interval, Duration::from_secs(10));
    }

    #[test]
    fn file_overrides_defaults() {
        let file = FileConfig::from_toml(
            r#"
            address = "10.0.0.1:9000"
            grpc_address = "10.0.0.1:3200"
            poll_interval = "500ms"
            report_interval = "1m"
            "#,
        )
        .unwrap();
        let config = AgentConfig::resolve(&cli(&[]), file).unwrap();
        assert_eq!(config.address, "10.0.0.1:9000");
        assert_eq!(config.grpc_address.as_deref(), Some("10.0.0.1:3200"));
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.report_interval, Duration::from_secs(60));
    }

    #[test]
    fn flags_override_file() {
        let file = FileConfig::from_toml("address = \"10.0.0.1:9000\"\npoll_interval = \"5s\"").unwrap();
        let config = AgentConfig::resolve(&cli(&["-a", "localhost:8081", "-p", "1s", "-k", "secret"]), file).unwrap();
        assert_eq!(config.address, "localhost:8081");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.key, "secret");
    }

    #[test]
    fn empty_grpc_address_selects_http() {
        let file = FileConfig::from_toml("grpc_address = \"\"").unwrap();
        let config = AgentConfig::resolve(&cli(&[]), file).unwrap();
        assert_eq!(config.grpc_address, None);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(Cli::try_parse_from(["vitals-agent", "-p", "soon"]).is_err());
        assert!(FileConfig::from_toml("unknown_key = 1").is_err());

        let file = FileConfig::from_toml("report_interval = \"often\"").unwrap();
        assert!(AgentConfig::resolve(&cli(&[]), file).is_err());

        assert!(AgentConfig::resolve(&cli(&["-r", "0"]), FileConfig::default()).is_err());
    }

    #[test]
    fn config_file_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(&path, "key = \"from-file\"\n").unwrap();

        let config = AgentConfig::load(&cli(&["-c", path.to_str().unwrap()])).unwrap();
        assert_eq!(config.key, "from-file");

        let missing = dir.path().join("missing.toml");
        assert!(AgentConfig::load(&cli(&["-c", missing.to_str().unwrap()])).is_err());
    }
}
