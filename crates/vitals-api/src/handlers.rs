//! Metric API handlers.
//!
//! Writes are checked in this order: content type, decryption, JSON shape,
//! kind and payload, digest, storage. The first failure decides the status.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use tracing::{debug, info};

use vitals_core::{Metric, MetricKind};

use crate::ApiState;
use crate::error::ApiError;

// ── Reads ──────────────────────────────────────────────────────

/// GET /value/{kind}/{id}
pub async fn get_value(
    State(state): State<ApiState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<String, ApiError> {
    let mut metric = Metric::query(id, MetricKind::from(kind));
    state.store.get(&mut metric).await?;
    Ok(metric.render_value()?)
}

/// POST /value/
pub async fn get_value_json(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Metric>, ApiError> {
    require_json(&headers)?;
    let mut metric: Metric = serde_json::from_slice(&body)?;
    metric.digest = None;

    state.store.get(&mut metric).await?;
    state.signer.sign(&mut metric)?;
    Ok(Json(metric))
}

/// GET /ping
pub async fn ping(State(state): State<ApiState>) -> Result<StatusCode, ApiError> {
    match state.store.ping().await {
        Some(result) => {
            result?;
            Ok(StatusCode::OK)
        }
        None => Err(ApiError::NoPing),
    }
}

// ── Writes ─────────────────────────────────────────────────────

/// POST /update/{kind}/{id}/{value}
pub async fn update(
    State(state): State<ApiState>,
    Path((kind, id, value)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let metric = match MetricKind::from(kind) {
        MetricKind::Counter => {
            let delta = value.parse::<i64>().map_err(|_| ApiError::BadValue {
                kind: MetricKind::COUNTER,
                value,
            })?;
            Metric::counter(id, delta)
        }
        MetricKind::Gauge => {
            let v = value.parse::<f64>().map_err(|_| ApiError::BadValue {
                kind: MetricKind::GAUGE,
                value,
            })?;
            Metric::gauge(id, v)
        }
        unknown => return Err(vitals_core::MetricError::UnknownMetricType(unknown.to_string()).into()),
    };

    state.store.put(&metric).await?;
    Ok(StatusCode::OK)
}

/// POST /update/
pub async fn update_json(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    require_json(&headers)?;
    let plaintext = state.decrypter.decrypt(&body)?;
    let metric: Metric = serde_json::from_slice(&plaintext)?;

    apply(&state, &metric).await?;
    Ok(StatusCode::OK)
}

/// POST /updates/
///
/// Metrics are applied in order and the first failure ends the request;
/// metrics before it stay applied.
pub async fn update_batch(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    require_json(&headers)?;
    let plaintext = state.decrypter.decrypt(&body)?;
    let batch: Vec<Metric> = serde_json::from_slice(&plaintext)?;

    for (applied, metric) in batch.iter().enumerate() {
        if let Err(e) = apply(&state, metric).await {
            debug!(applied, id = %metric.id, "batch stopped at first error");
            return Err(e);
        }
    }
    debug!(metrics = batch.len(), "metric batch applied");
    Ok(StatusCode::OK)
}

/// Validate one metric and hand it to storage.
async fn apply(state: &ApiState, metric: &Metric) -> Result<(), ApiError> {
    metric.check_payload()?;
    if !state.signer.validate(metric)? {
        info!(id = %metric.id, "rejecting metric with invalid hash");
        return Err(ApiError::InvalidDigest);
    }
    state.store.put(metric).await?;
    Ok(())
}

/// Accept `application/json`, with or without parameters.
fn require_json(headers: &HeaderMap) -> Result<(), ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case("application/json") {
        Ok(())
    } else {
        Err(ApiError::ContentType)
    }
}
