//! vitals-collector — samples process and host figures for the agent.
//!
//! Two independent sample sets are kept, each behind its own lock:
//!
//! - runtime: the `PollCount` counter, `RandomValue`, and figures for the
//!   agent process itself
//! - utilization: host memory and per-core CPU usage
//!
//! Each refresh replaces its set wholesale, so readers never see a
//! half-updated set.

pub mod collector;
pub mod error;

pub use collector::{Collector, POLL_COUNT};
pub use error::{CollectorError, CollectorResult};
