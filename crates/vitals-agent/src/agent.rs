//! The agent: poll jobs feeding the collector and a report job draining it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use vitals_collector::Collector;
use vitals_core::Signer;
use vitals_scheduler::{CancellationToken, Scheduler, SchedulerResult};

use crate::error::SendError;
use crate::sender::MetricSender;

pub struct Agent {
    collector: Arc<Collector>,
    signer: Signer,
    sender: Arc<dyn MetricSender>,
    poll_interval: Duration,
    report_interval: Duration,
    scheduler: Scheduler,
}

impl Agent {
    pub fn new(
        collector: Arc<Collector>,
        signer: Signer,
        sender: Arc<dyn MetricSender>,
        poll_interval: Duration,
        report_interval: Duration,
    ) -> Self {
        Self {
            collector,
            signer,
            sender,
            poll_interval,
            report_interval,
            scheduler: Scheduler::new(),
        }
    }

    /// Register the two poll jobs and the report job under `token`.
    pub fn start(&mut self, token: &CancellationToken) -> SchedulerResult<()> {
        let collector = Arc::clone(&self.collector);
        self.scheduler.add(
            token,
            move || {
                let collector = Arc::clone(&collector);
                async move {
                    if let Err(e) = collector.update_runtime_metrics().await {
                        warn!(error = %e, "failed to update runtime metrics");
                    }
                }
            },
            self.poll_interval,
        )?;

        let collector = Arc::clone(&self.collector);
        self.scheduler.add(
            token,
            move || {
                let collector = Arc::clone(&collector);
                async move {
                    if let Err(e) = collector.update_utilization_metrics().await {
                        warn!(error = %e, "failed to update utilization metrics");
                    }
                }
            },
            self.poll_interval,
        )?;

        let collector = Arc::clone(&self.collector);
        let signer = self.signer.clone();
        let sender = Arc::clone(&self.sender);
        self.scheduler.add(
            token,
            move || {
                let collector = Arc::clone(&collector);
                let signer = signer.clone();
                let sender = Arc::clone(&sender);
                async move {
                    if let Err(e) = report(&collector, &signer, sender.as_ref()).await {
                        warn!(error = %e, "failed to send metrics");
                    }
                }
            },
            self.report_interval,
        )?;

        info!(
            poll_ms = self.poll_interval.as_millis() as u64,
            report_ms = self.report_interval.as_millis() as u64,
            "agent started"
        );
        Ok(())
    }

    /// Stop every job and wait for in-flight invocations to finish.
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        self.scheduler.stop().await?;
        info!("agent stopped");
        Ok(())
    }
}

/// One report cycle: list, sign, send.
///
/// A metric that cannot be signed is still sent, without a digest.
pub async fn report(collector: &Collector, signer: &Signer, sender: &dyn MetricSender) -> Result<(), SendError> {
    let mut batch = collector.list_metrics().await;
    for metric in &mut batch {
        if let Err(e) = signer.sign(metric) {
            warn!(id = %metric.id, error = %e, "failed to set hash");
        }
    }
    sender.send(&batch).await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use vitals_collector::POLL_COUNT;
    use vitals_core::Metric;

    use super::*;

    #[derive(Default)]
    struct Recording {
        batches: Mutex<Vec<Vec<Metric>>>,
    }

    #[async_trait]
    impl MetricSender for Recording {
        async fn send(&self, batch: &[Metric]) -> Result<(), SendError> {
            self.batches.lock().unwrap().push(batch.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn report_signs_every_metric() {
        let collector = Collector::new();
        collector.update_runtime_metrics().await.unwrap();
        let signer = Signer::new("secret");
        let sender = Recording::default();

        report(&collector, &signer, &sender).await.unwrap();

        let batches = sender.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch[0].id, POLL_COUNT);
        assert_eq!(batch[0].delta, Some(1));
        for m in batch {
            assert!(signer.validate(m).unwrap(), "{} should validate", m.id);
        }
    }

    #[tokio::test]
    async fn report_without_key_sends_no_digest() {
        let collector = Collector::new();
        let sender = Recording::default();
        report(&collector, &Signer::NoOp, &sender).await.unwrap();

        let batches = sender.batches.lock().unwrap();
        assert!(batches[0].iter().all(|m| m.digest.is_none()));
    }

    #[tokio::test]
    async fn running_agent_reports_periodically() {
        let sender = Arc::new(Recording::default());
        let mut agent = Agent::new(
            Arc::new(Collector::new()),
            Signer::NoOp,
            Arc::clone(&sender) as Arc<dyn MetricSender>,
            Duration::from_millis(10),
            Duration::from_millis(25),
        );
        let token = CancellationToken::new();
        agent.start(&token).unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        agent.stop().await.unwrap();

        let sent = sender.batches.lock().unwrap().len();
        assert!(sent >= 2, "expected at least two reports, got {sent}");
        let last = sender.batches.lock().unwrap().last().cloned().unwrap();
        assert!(last[0].delta.unwrap() >= 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(sender.batches.lock().unwrap().len(), sent);
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let mut agent = Agent::new(
            Arc::new(Collector::new()),
            Signer::NoOp,
            Arc::new(Recording::default()),
            Duration::ZERO,
            Duration::from_secs(1),
        );
        assert!(agent.start(&CancellationToken::new()).is_err());
    }
}
