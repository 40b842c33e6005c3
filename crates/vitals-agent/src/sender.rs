//! Batch senders: how a report cycle reaches the server.

use std::net::{IpAddr, UdpSocket};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http_body_util::Full;
use hyper_util::rt::TokioIo;
use tracing::{debug, warn};

use vitals_core::{Encrypter, Metric};
use vitals_grpc::GrpcClient;

use crate::error::SendError;

/// Header carrying the agent's own address for the server's subnet filter.
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Delivers one signed batch to the server.
#[async_trait]
pub trait MetricSender: Send + Sync {
    async fn send(&self, batch: &[Metric]) -> Result<(), SendError>;
}

// ── HTTP ───────────────────────────────────────────────────────

/// Posts batches as a JSON array to `/updates/`, encrypted when a public
/// key is configured.
pub struct HttpSender {
    address: String,
    encrypter: Encrypter,
    real_ip: Option<IpAddr>,
    timeout: Duration,
}

impl HttpSender {
    pub fn new(address: impl Into<String>, encrypter: Encrypter) -> Self {
        let real_ip = outbound_ip();
        if real_ip.is_none() {
            warn!("could not determine outbound address; requests carry no X-Real-IP");
        }
        Self {
            address: address.into(),
            encrypter,
            real_ip,
            timeout: Duration::from_secs(10),
        }
    }

    /// Override the address reported in `X-Real-IP`.
    pub fn with_real_ip(mut self, ip: Option<IpAddr>) -> Self {
        self.real_ip = ip;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn post(&self, uri: &str, body: Vec<u8>) -> Result<(), SendError> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|source| SendError::Connect {
                addr: self.address.clone(),
                source,
            })?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "report connection closed with error");
            }
        });

        let mut builder = http::Request::builder()
            .method(http::Method::POST)
            .uri(uri)
            .header(HOST, &self.address)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, concat!("vitals-agent/", env!("CARGO_PKG_VERSION")));
        if let Some(ip) = self.real_ip {
            builder = builder.header(REAL_IP_HEADER, ip.to_string());
        }
        let req = builder.body(Full::new(Bytes::from(body)))?;

        let resp = sender.send_request(req).await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(SendError::Status(resp.status()))
        }
    }
}

#[async_trait]
impl MetricSender for HttpSender {
    async fn send(&self, batch: &[Metric]) -> Result<(), SendError> {
        let plaintext = serde_json::to_vec(batch)?;
        let body = self.encrypter.encrypt(&plaintext)?;
        let uri = format!("http://{}/updates/", self.address);

        tokio::time::timeout(self.timeout, self.post(&uri, body))
            .await
            .map_err(|_| SendError::Timeout(self.timeout))??;
        debug!(metrics = batch.len(), %uri, "batch posted");
        Ok(())
    }
}

/// The local address this host would use to reach the internet.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
pub fn outbound_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

// ── gRPC ───────────────────────────────────────────────────────

/// Streams batches over one `PutMetrics` call each.
pub struct GrpcSender {
    client: GrpcClient,
}

impl GrpcSender {
    pub fn new(client: GrpcClient) -> Self {
        Self { client }
    }

    /// Build a sender whose channel connects on first use.
    pub fn connect_lazy(addr: &str) -> Result<Self, SendError> {
        Ok(Self::new(GrpcClient::connect_lazy(addr)?))
    }
}

#[async_trait]
impl MetricSender for GrpcSender {
    async fn send(&self, batch: &[Metric]) -> Result<(), SendError> {
        self.client.put_metrics(batch).await?;
        Ok(())
    }
}
