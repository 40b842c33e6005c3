//! Agent error types.

use std::time::Duration;

use thiserror::Error;

use vitals_core::CryptoError;

/// Why a batch did not reach the server.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to encrypt batch: {0}")]
    Encrypt(#[from] CryptoError),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),

    #[error("http transport error: {0}")]
    Http(#[from] hyper::Error),

    #[error("server answered {0}")]
    Status(http::StatusCode),

    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("grpc transport error: {0}")]
    Grpc(#[from] vitals_grpc::GrpcError),
}
