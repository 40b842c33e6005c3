//! vitals-scheduler — periodic background jobs.
//!
//! Each job runs on its own tokio task and fires once per interval until its
//! cancellation token is cancelled. The token is a child of the caller's
//! token, so cancelling the caller's root token stops every job.
//!
//! ```text
//! root token
//!   ├── child token ── task: tick → job() → tick → job() ...
//!   └── child token ── task: tick → job() ...
//! ```
//!
//! [`Scheduler::stop`] cancels every job and waits for the tasks to exit.

pub mod error;
pub mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::Scheduler;
pub use tokio_util::sync::CancellationToken;
