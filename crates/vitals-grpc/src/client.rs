//! Agent-side client for the metrics service.

use std::time::Duration;

use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use vitals_core::Metric;

use crate::error::GrpcResult;
use crate::proto;
use crate::proto::metrics_client::MetricsClient;

/// A cheaply clonable handle on one channel to the collector.
#[derive(Debug, Clone)]
pub struct GrpcClient {
    client: MetricsClient<Channel>,
}

impl GrpcClient {
    /// Build a client for `addr` (`host:port`).
    ///
    /// The connection is established on first use, so the agent can start
    /// before the collector.
    pub fn connect_lazy(addr: &str) -> GrpcResult<Self> {
        let channel = Endpoint::from_shared(format!("http://{addr}"))?
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .connect_lazy();
        Ok(Self {
            client: MetricsClient::new(channel),
        })
    }

    /// Stream `batch` as one `PutMetrics` call, one message per metric.
    pub async fn put_metrics(&self, batch: &[Metric]) -> GrpcResult<()> {
        let requests: Vec<proto::PutMetricRequest> = batch
            .iter()
            .map(|m| proto::PutMetricRequest {
                metric: Some(m.into()),
            })
            .collect();

        let mut client = self.client.clone();
        client.put_metrics(futures_util::stream::iter(requests)).await?;
        debug!(metrics = batch.len(), "batch streamed");
        Ok(())
    }

    pub async fn put_metric(&self, metric: &Metric) -> GrpcResult<()> {
        let mut client = self.client.clone();
        client
            .put_metric(proto::PutMetricRequest {
                metric: Some(metric.into()),
            })
            .await?;
        Ok(())
    }

    /// Fetch the stored payload for `query` (id and kind).
    pub async fn get_metric(&self, query: &Metric) -> GrpcResult<Metric> {
        let mut client = self.client.clone();
        let response = client
            .get_metric(proto::GetMetricRequest {
                metric: Some(query.into()),
            })
            .await?
            .into_inner();
        response
            .metric
            .map(Metric::from)
            .ok_or_else(|| tonic::Status::internal("response carries no metric").into())
    }
}
