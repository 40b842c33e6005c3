//! HMAC-SHA256 digests for tamper evidence.
//!
//! The digest covers a canonical message `"{id}:{kind}:{payload}"`, where the
//! payload is the decimal delta for counters and the value with six fixed
//! fractional digits for gauges. Agent and server must agree on this text
//! byte for byte.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{MetricError, SignatureError};
use crate::metric::{Metric, MetricKind};

type HmacSha256 = Hmac<Sha256>;

/// Signs and validates metric digests.
#[derive(Clone)]
pub enum Signer {
    /// No key configured: signing is skipped and every metric validates.
    NoOp,
    Hmac { key: Vec<u8> },
}

impl Signer {
    /// Build a signer from a shared secret; an empty key selects `NoOp`.
    pub fn new(key: &str) -> Self {
        if key.is_empty() {
            Signer::NoOp
        } else {
            Signer::Hmac {
                key: key.as_bytes().to_vec(),
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Signer::Hmac { .. })
    }

    /// Compute the digest and store it in `metric.digest`.
    pub fn sign(&self, metric: &mut Metric) -> Result<(), SignatureError> {
        let Signer::Hmac { key } = self else {
            return Ok(());
        };
        let mac = compute(key, metric)?;
        metric.digest = Some(hex::encode(mac.finalize().into_bytes()));
        Ok(())
    }

    /// Check `metric.digest` against a freshly computed one.
    ///
    /// A digest that is not valid hex is an error; a well-formed digest that
    /// does not match yields `Ok(false)`. An absent digest never matches.
    pub fn validate(&self, metric: &Metric) -> Result<bool, SignatureError> {
        let Signer::Hmac { key } = self else {
            return Ok(true);
        };
        let mac = compute(key, metric)?;
        let expected = hex::decode(metric.digest.as_deref().unwrap_or_default())?;
        Ok(mac.verify_slice(&expected).is_ok())
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signer::NoOp => f.write_str("Signer::NoOp"),
            Signer::Hmac { .. } => f.write_str("Signer::Hmac { key: <redacted> }"),
        }
    }
}

/// The exact text covered by a metric's digest.
pub fn canonical_message(metric: &Metric) -> Result<String, MetricError> {
    metric.check_payload()?;
    match (&metric.kind, metric.delta, metric.value) {
        (MetricKind::Counter, Some(delta), _) => Ok(format!("{}:{}:{delta}", metric.id, metric.kind)),
        (MetricKind::Gauge, _, Some(value)) => Ok(format!("{}:{}:{value:.6}", metric.id, metric.kind)),
        _ => Err(MetricError::UnknownMetricType(metric.kind.to_string())),
    }
}

fn compute(key: &[u8], metric: &Metric) -> Result<HmacSha256, MetricError> {
    let message = canonical_message(metric)?;
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| MetricError::BadArgument(format!("hmac key: {e}")))?;
    mac.update(message.as_bytes());
    Ok(mac)
}
