//! Error types for the metric model and its protection layers.

use thiserror::Error;

/// A metric that cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricError {
    #[error("unknown metric type: {0}")]
    UnknownMetricType(String),

    #[error("bad argument: {0}")]
    BadArgument(String),
}

/// Errors raised while signing or validating a digest.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error("malformed digest: {0}")]
    Decode(#[from] hex::FromHexError),
}

/// Errors raised by the RSA payload layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("failed to read key file {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse key: {0}")]
    KeyParse(String),

    #[error("rsa operation failed: {0}")]
    Rsa(#[from] rsa::Error),
}
