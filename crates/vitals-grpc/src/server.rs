//! Server side of the metrics gRPC service.
//!
//! Every write is validated against the configured signer before it
//! reaches storage. A streamed batch is applied in arrival order and
//! stops at the first failure; earlier metrics stay applied.

use std::future::Future;
use std::sync::Arc;

use tonic::transport::server::TcpIncoming;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, warn};

use vitals_core::{Metric, MetricError, Signer};
use vitals_storage::{Storage, StorageError};

use crate::error::{GrpcError, GrpcResult};
use crate::proto;
use crate::proto::metrics_server::{Metrics, MetricsServer};

/// gRPC implementation of the metrics service.
pub struct MetricsService {
    store: Arc<dyn Storage>,
    signer: Signer,
}

impl MetricsService {
    pub fn new(store: Arc<dyn Storage>, signer: Signer) -> Self {
        Self { store, signer }
    }

    /// Get the tonic service for mounting on a gRPC server.
    pub fn into_service(self) -> MetricsServer<Self> {
        MetricsServer::new(self)
    }

    /// Validate and store one wire metric.
    async fn apply(&self, pb: Option<proto::Metric>) -> Result<(), Status> {
        let metric = required(pb)?;
        metric.check_payload().map_err(|e| metric_status(&e))?;

        match self.signer.validate(&metric) {
            Ok(true) => {}
            Ok(false) => {
                info!(id = %metric.id, "rejecting metric with invalid hash");
                return Err(Status::invalid_argument("invalid hash"));
            }
            Err(e) => {
                warn!(id = %metric.id, error = %e, "failed to validate hash");
                return Err(Status::internal("failed to validate hash"));
            }
        }

        self.store.put(&metric).await.map_err(|e| storage_status(&e))
    }
}

#[tonic::async_trait]
impl Metrics for MetricsService {
    async fn get_metric(
        &self,
        request: Request<proto::GetMetricRequest>,
    ) -> Result<Response<proto::GetMetricResponse>, Status> {
        let mut metric = required(request.into_inner().metric)?;
        self.store.get(&mut metric).await.map_err(|e| storage_status(&e))?;

        if let Err(e) = self.signer.sign(&mut metric) {
            warn!(id = %metric.id, error = %e, "failed to sign metric");
            return Err(Status::internal("failed to set metric hash"));
        }

        Ok(Response::new(proto::GetMetricResponse {
            metric: Some(proto::Metric::from(&metric)),
        }))
    }

    async fn put_metric(
        &self,
        request: Request<proto::PutMetricRequest>,
    ) -> Result<Response<proto::PutMetricResponse>, Status> {
        self.apply(request.into_inner().metric).await?;
        Ok(Response::new(proto::PutMetricResponse {}))
    }

    async fn put_metrics(
        &self,
        request: Request<Streaming<proto::PutMetricRequest>>,
    ) -> Result<Response<proto::PutMetricResponse>, Status> {
        let mut stream = request.into_inner();
        let mut applied = 0usize;

        while let Some(message) = stream.message().await? {
            if let Err(status) = self.apply(message.metric).await {
                debug!(applied, code = ?status.code(), "batch stopped at first error");
                return Err(status);
            }
            applied += 1;
        }

        debug!(applied, "metric batch applied");
        Ok(Response::new(proto::PutMetricResponse {}))
    }
}

/// Serve `service` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    service: MetricsService,
    shutdown: impl Future<Output = ()> + Send,
) -> GrpcResult<()> {
    let addr = listener
        .local_addr()
        .map_err(|e| GrpcError::Listener(e.to_string()))?;
    let incoming =
        TcpIncoming::from_listener(listener, true, None).map_err(|e| GrpcError::Listener(e.to_string()))?;

    info!(%addr, "gRPC server listening");
    tonic::transport::Server::builder()
        .add_service(service.into_service())
        .serve_with_incoming_shutdown(incoming, shutdown)
        .await?;
    info!("gRPC server stopped");
    Ok(())
}

fn required(pb: Option<proto::Metric>) -> Result<Metric, Status> {
    pb.map(Metric::from)
        .ok_or_else(|| Status::invalid_argument("request carries no metric"))
}

fn metric_status(e: &MetricError) -> Status {
    match e {
        MetricError::UnknownMetricType(_) => Status::unimplemented("unknown metric type"),
        MetricError::BadArgument(_) => Status::invalid_argument("invalid request args"),
    }
}

/// Map a storage failure onto its gRPC status.
pub fn storage_status(e: &StorageError) -> Status {
    match e {
        StorageError::UnknownMetricType(_) => Status::unimplemented("unknown metric type"),
        StorageError::BadArgument(_) => Status::invalid_argument("invalid request args"),
        StorageError::NotFound(_) => Status::not_found("metric not found"),
        other => {
            warn!(error = %other, "storage failure");
            Status::internal("internal storage error")
        }
    }
}

#[cfg(test)]
mod tests {
    use tonic::Code;
    use vitals_core::MetricKind;
    use vitals_storage::FileStorage;

    use super::*;

    fn service(dir: &tempfile::TempDir, key: &str) -> MetricsService {
        let store = FileStorage::in_memory(&dir.path().join("m.json"), false);
        MetricsService::new(Arc::new(store), Signer::new(key))
    }

    fn put(metric: &Metric) -> Request<proto::PutMetricRequest> {
        Request::new(proto::PutMetricRequest {
            metric: Some(proto::Metric::from(metric)),
        })
    }

    fn get(id: &str, kind: MetricKind) -> Request<proto::GetMetricRequest> {
        Request::new(proto::GetMetricRequest {
            metric: Some(proto::Metric::from(&Metric::query(id, kind))),
        })
    }

    #[tokio::test]
    async fn put_then_get_counter() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir, "");
        svc.put_metric(put(&Metric::counter("Requests", 5))).await.unwrap();
        svc.put_metric(put(&Metric::counter("Requests", 7))).await.unwrap();

        let resp = svc.get_metric(get("Requests", MetricKind::Counter)).await.unwrap();
        let metric = Metric::from(resp.into_inner().metric.unwrap());
        assert_eq!(metric.delta, Some(12));
        assert!(metric.digest.is_none());
    }

    #[tokio::test]
    async fn get_signs_when_keyed() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir, "secret");
        let mut m = Metric::gauge("Temp", 36.6);
        Signer::new("secret").sign(&mut m).unwrap();
        svc.put_metric(put(&m)).await.unwrap();

        let resp = svc.get_metric(get("Temp", MetricKind::Gauge)).await.unwrap();
        let metric = Metric::from(resp.into_inner().metric.unwrap());
        assert!(Signer::new("secret").validate(&metric).unwrap());
    }

    #[tokio::test]
    async fn status_codes() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir, "");

        let unknown = Metric::query("X", MetricKind::Unknown("histogram".to_string()));
        let err = svc.put_metric(put(&unknown)).await.unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);

        let empty = Metric::query("X", MetricKind::Gauge);
        let err = svc.put_metric(put(&empty)).await.unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        let nan = Metric::gauge("X", f64::NAN);
        let err = svc.put_metric(put(&nan)).await.unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        let err = svc.get_metric(get("X", MetricKind::Gauge)).await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);

        let err = svc.get_metric(get("Nope", MetricKind::Counter)).await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);

        let err = svc
            .put_metric(Request::new(proto::PutMetricRequest { metric: None }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn digest_checks() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir, "secret");

        let mut good = Metric::counter("PollCount", 1);
        Signer::new("secret").sign(&mut good).unwrap();
        svc.put_metric(put(&good)).await.unwrap();

        let mut tampered = good.clone();
        tampered.delta = Some(2);
        let err = svc.put_metric(put(&tampered)).await.unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        let mut garbled = good.clone();
        garbled.digest = Some("zz".to_string());
        let err = svc.put_metric(put(&garbled)).await.unwrap_err();
        assert_eq!(err.code(), Code::Internal);
    }

    #[test]
    fn storage_errors_map_to_codes() {
        assert_eq!(storage_status(&StorageError::NotFound("x".into())).code(), Code::NotFound);
        assert_eq!(storage_status(&StorageError::BadArgument("x".into())).code(), Code::InvalidArgument);
        assert_eq!(
            storage_status(&StorageError::UnknownMetricType("x".into())).code(),
            Code::Unimplemented
        );
        assert_eq!(storage_status(&StorageError::Unavailable("db".into())).code(), Code::Internal);
    }
}
