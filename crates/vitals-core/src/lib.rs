//! vitals-core — types shared by the vitals agent and server.
//!
//! - [`Metric`] / [`MetricKind`]: the typed counter/gauge model and its
//!   wire representation.
//! - [`Signer`]: HMAC-SHA256 digests over a canonical per-metric message.
//! - [`Encrypter`] / [`Decrypter`]: chunked RSA-OAEP wrapping of whole
//!   request bodies.
//!
//! Both protection layers have a `NoOp` variant selected when no key is
//! configured, so call sites never branch on "is a key present".

pub mod crypto;
pub mod duration;
pub mod error;
pub mod metric;
pub mod signer;

pub use crypto::{Decrypter, Encrypter};
pub use duration::parse_duration;
pub use error::{CryptoError, MetricError, SignatureError};
pub use metric::{Metric, MetricKind};
pub use signer::Signer;
