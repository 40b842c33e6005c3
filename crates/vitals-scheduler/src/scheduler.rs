//! Owns the periodic job tasks and their cancellation tokens.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{SchedulerError, SchedulerResult};

/// A registered job: its token and the task driving it.
struct JobSlot {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs jobs on fixed intervals until cancelled.
///
/// A job never overlaps itself: the next tick is only awaited once the
/// previous invocation has finished. Missed ticks are skipped.
#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<JobSlot>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `job` to run every `interval`.
    ///
    /// The first invocation happens one full interval after registration.
    /// The job stops when `parent` or the scheduler is cancelled.
    pub fn add<F, Fut>(
        &mut self,
        parent: &CancellationToken,
        job: F,
        interval: Duration,
    ) -> SchedulerResult<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval(interval));
        }

        let token = parent.child_token();
        let job_token = token.clone();
        let index = self.jobs.len();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = job_token.cancelled() => {
                        debug!(job = index, "job cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        job().await;
                    }
                }
            }
        });

        self.jobs.push(JobSlot { token, handle });
        debug!(job = index, interval_ms = interval.as_millis() as u64, "job scheduled");
        Ok(())
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Cancel every job and wait until all of their tasks have exited.
    ///
    /// A job that is mid-invocation finishes that invocation first.
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        for slot in &self.jobs {
            slot.token.cancel();
        }

        let count = self.jobs.len();
        let mut first_err = None;
        for slot in self.jobs.drain(..) {
            if let Err(e) = slot.handle.await {
                warn!(error = %e, "job task did not exit cleanly");
                first_err.get_or_insert(SchedulerError::Join(e));
            }
        }

        info!(jobs = count, "scheduler stopped");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for slot in &self.jobs {
            slot.token.cancel();
        }
    }
}
