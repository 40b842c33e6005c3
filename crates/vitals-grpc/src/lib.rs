//! vitals-grpc — the `vitals.Metrics` gRPC service and its client.
//!
//! ```text
//! agent                               server
//!   GrpcClient ── PutMetrics (stream) ──▶ MetricsService ──▶ Storage
//!              ── PutMetric / GetMetric ─▶
//! ```
//!
//! Status codes: unknown kind → `UNIMPLEMENTED`, missing payload or bad
//! digest → `INVALID_ARGUMENT`, unknown id → `NOT_FOUND`, everything else
//! → `INTERNAL`.

pub mod client;
pub mod convert;
pub mod error;
pub mod server;

/// Generated protobuf types and gRPC service stubs.
pub mod proto {
    tonic::include_proto!("vitals");
}

pub use client::GrpcClient;
pub use error::{GrpcError, GrpcResult};
pub use server::{serve, MetricsService};
