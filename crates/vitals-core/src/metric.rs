//! The metric model shared by agent and server.
//!
//! A [`Metric`] carries exactly one payload, selected by its kind: counters
//! carry a signed `delta`, gauges carry an absolute `value`. On the wire the
//! kind travels as `"type"` and the digest as `"hash"`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MetricError;

/// The kind of a metric.
///
/// Unrecognised kind names survive deserialization as [`MetricKind::Unknown`]
/// so that transports can answer "unknown metric type" instead of rejecting
/// the whole body as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetricKind {
    Counter,
    Gauge,
    Unknown(String),
}

impl MetricKind {
    pub const COUNTER: &'static str = "counter";
    pub const GAUGE: &'static str = "gauge";

    pub fn as_str(&self) -> &str {
        match self {
            MetricKind::Counter => Self::COUNTER,
            MetricKind::Gauge => Self::GAUGE,
            MetricKind::Unknown(name) => name,
        }
    }

    /// Fail with `UnknownMetricType` unless this is a counter or a gauge.
    pub fn ensure_known(&self) -> Result<(), MetricError> {
        match self {
            MetricKind::Unknown(name) => Err(MetricError::UnknownMetricType(name.clone())),
            _ => Ok(()),
        }
    }
}

impl From<String> for MetricKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            Self::COUNTER => MetricKind::Counter,
            Self::GAUGE => MetricKind::Gauge,
            _ => MetricKind::Unknown(name),
        }
    }
}

impl From<MetricKind> for String {
    fn from(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for MetricKind {
    type Err = MetricError;

    /// Strict parse: unknown names are an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = MetricKind::from(s.to_string());
        kind.ensure_known()?;
        Ok(kind)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single counter or gauge reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(rename = "hash", default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl Metric {
    /// A counter carrying `delta`.
    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Counter,
            delta: Some(delta),
            value: None,
            digest: None,
        }
    }

    /// A gauge carrying `value`.
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Gauge,
            delta: None,
            value: Some(value),
            digest: None,
        }
    }

    /// A payload-less lookup key, filled in by a storage read.
    pub fn query(id: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            id: id.into(),
            kind,
            delta: None,
            value: None,
            digest: None,
        }
    }

    /// Check that the kind is known and its payload is present.
    ///
    /// Gauges must be finite: NaN and infinities have no JSON form and would
    /// poison a snapshot.
    pub fn check_payload(&self) -> Result<(), MetricError> {
        match self.kind {
            MetricKind::Counter if self.delta.is_none() => Err(self.missing_payload()),
            MetricKind::Gauge => match self.value {
                None => Err(self.missing_payload()),
                Some(v) if !v.is_finite() => Err(MetricError::BadArgument(format!(
                    "non-finite gauge value {v} for metric '{}'",
                    self.id
                ))),
                Some(_) => Ok(()),
            },
            MetricKind::Counter => Ok(()),
            MetricKind::Unknown(ref name) => Err(MetricError::UnknownMetricType(name.clone())),
        }
    }

    /// Render the payload as text.
    ///
    /// Counters render as decimal integers. Gauges use the shortest decimal
    /// that round-trips, without an exponent (`37.1`, `5`, `0.000001`).
    pub fn render_value(&self) -> Result<String, MetricError> {
        self.check_payload()?;
        match (&self.kind, self.delta, self.value) {
            (MetricKind::Counter, Some(delta), _) => Ok(delta.to_string()),
            (MetricKind::Gauge, _, Some(value)) => Ok(value.to_string()),
            _ => Err(self.missing_payload()),
        }
    }

    fn missing_payload(&self) -> MetricError {
        MetricError::BadArgument(format!("empty {} payload for metric '{}'", self.kind, self.id))
    }
}
