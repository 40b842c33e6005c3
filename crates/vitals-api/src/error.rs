//! API error type and its mapping onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::warn;

use vitals_core::{CryptoError, MetricError, SignatureError};
use vitals_storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("content type must be application/json")]
    ContentType,

    #[error("malformed body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("cannot parse {kind} value {value:?}")]
    BadValue { kind: &'static str, value: String },

    #[error("invalid hash")]
    InvalidDigest,

    #[error("hash check failed: {0}")]
    Signature(#[from] SignatureError),

    #[error("cannot decrypt body: {0}")]
    Decrypt(#[from] CryptoError),

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("storage has no connectivity check")]
    NoPing,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ContentType
            | ApiError::Body(_)
            | ApiError::BadValue { .. }
            | ApiError::InvalidDigest
            | ApiError::Metric(MetricError::BadArgument(_))
            | ApiError::Storage(StorageError::BadArgument(_)) => StatusCode::BAD_REQUEST,
            ApiError::Metric(MetricError::UnknownMetricType(_))
            | ApiError::Storage(StorageError::UnknownMetricType(_)) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Signature(_) | ApiError::Decrypt(_) | ApiError::Storage(_) | ApiError::NoPing => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::ContentType.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidDigest.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Metric(MetricError::UnknownMetricType("x".into())).status(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            ApiError::Metric(MetricError::BadArgument("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Storage(StorageError::NotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Storage(StorageError::Unavailable("db".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Decrypt(CryptoError::KeyParse("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::NoPing.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
