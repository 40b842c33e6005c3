//! gRPC transport errors.

use thiserror::Error;

pub type GrpcResult<T> = Result<T, GrpcError>;

#[derive(Debug, Error)]
pub enum GrpcError {
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("listener error: {0}")]
    Listener(String),

    #[error("rpc failed: {0}")]
    Status(#[from] tonic::Status),
}
