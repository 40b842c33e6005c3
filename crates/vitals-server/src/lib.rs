//! vitals-server — the metrics collection server.
//!
//! ```text
//!   HTTP  (axum, vitals-api) ──┐
//!                              ├──▶ MetricStore ──▶ snapshot file | PostgreSQL
//!   gRPC  (tonic, vitals-grpc) ┘         ▲
//!                                        └── snapshot job (vitals-scheduler)
//! ```
//!
//! Both listeners share one store and one signer. Shutdown stops the
//! snapshot job, drains both listeners within the grace period and writes
//! a last snapshot.

pub mod config;
pub mod server;

pub use config::{Cli, FileConfig, ServerConfig};
pub use server::Server;
