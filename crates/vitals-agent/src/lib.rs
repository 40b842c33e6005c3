//! vitals-agent — samples the local process and host and reports to the
//! server.
//!
//! ```text
//!  poll (×2) ──▶ Collector ◀── report ──▶ Signer ──▶ MetricSender
//!                                                     ├─ HttpSender  POST /updates/
//!                                                     └─ GrpcSender  PutMetrics stream
//! ```
//!
//! Failed reports are logged and dropped; the next report carries fresh
//! samples and the cumulative `PollCount`.

pub mod agent;
pub mod config;
pub mod error;
pub mod sender;

pub use agent::{Agent, report};
pub use config::{AgentConfig, Cli, FileConfig};
pub use error::SendError;
pub use sender::{GrpcSender, HttpSender, MetricSender, outbound_ip};
