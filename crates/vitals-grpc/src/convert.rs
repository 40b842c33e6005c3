//! Conversions between the wire message and [`vitals_core::Metric`].

use vitals_core::{Metric, MetricKind};

use crate::proto::{self, metric::Payload, MetricType};

impl From<&Metric> for proto::Metric {
    fn from(metric: &Metric) -> Self {
        let (kind, payload) = match metric.kind {
            MetricKind::Counter => (MetricType::Counter, metric.delta.map(Payload::Delta)),
            MetricKind::Gauge => (MetricType::Gauge, metric.value.map(Payload::Value)),
            MetricKind::Unknown(_) => (MetricType::Unspecified, None),
        };
        proto::Metric {
            id: metric.id.clone(),
            r#type: kind as i32,
            payload,
            hash: metric.digest.clone().unwrap_or_default(),
        }
    }
}

impl From<proto::Metric> for Metric {
    /// Unspecified or unrecognised types become [`MetricKind::Unknown`] so the
    /// service can answer `UNIMPLEMENTED`.
    fn from(pb: proto::Metric) -> Self {
        let kind = match MetricType::try_from(pb.r#type) {
            Ok(MetricType::Counter) => MetricKind::Counter,
            Ok(MetricType::Gauge) => MetricKind::Gauge,
            Ok(MetricType::Unspecified) => MetricKind::Unknown("unspecified".to_string()),
            Err(_) => MetricKind::Unknown(pb.r#type.to_string()),
        };
        let (delta, value) = match pb.payload {
            Some(Payload::Delta(d)) => (Some(d), None),
            Some(Payload::Value(v)) => (None, Some(v)),
            None => (None, None),
        };
        Metric {
            id: pb.id,
            kind,
            delta,
            value,
            digest: (!pb.hash.is_empty()).then_some(pb.hash),
        }
    }
}
