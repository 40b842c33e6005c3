//! vitals-api — HTTP API of the metrics collector.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | HTML table of every stored metric |
//! | GET | `/ping` | Database connectivity check |
//! | GET | `/value/{kind}/{id}` | Stored value as plain text |
//! | POST | `/value/` | Stored value as JSON, signed when keyed |
//! | POST | `/update/{kind}/{id}/{value}` | Store one value from the path |
//! | POST | `/update/` | Store one JSON metric |
//! | POST | `/updates/` | Store a JSON batch, stopping at the first error |
//!
//! JSON write bodies may be RSA-encrypted; gzip request bodies are
//! decompressed and responses are compressed when the client asks.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pages;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use vitals_core::{Decrypter, Signer};
use vitals_storage::Storage;

pub use error::ApiError;
pub use middleware::TrustedSubnet;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn Storage>,
    pub signer: Signer,
    pub decrypter: Arc<Decrypter>,
}

impl ApiState {
    pub fn new(store: Arc<dyn Storage>, signer: Signer, decrypter: Decrypter) -> Self {
        Self {
            store,
            signer,
            decrypter: Arc::new(decrypter),
        }
    }
}

/// Build the complete API router.
///
/// When `trusted_subnet` is set, requests whose `X-Real-IP` is missing or
/// outside it are refused before reaching any handler.
pub fn build_router(state: ApiState, trusted_subnet: Option<TrustedSubnet>) -> Router {
    let mut router = Router::new()
        .route("/", get(pages::index))
        .route("/ping", get(handlers::ping))
        .route("/value/{kind}/{id}", get(handlers::get_value))
        .route("/value/", post(handlers::get_value_json))
        .route("/update/{kind}/{id}/{value}", post(handlers::update))
        .route("/update/", post(handlers::update_json))
        .route("/updates/", post(handlers::update_batch))
        .with_state(state);

    if let Some(subnet) = trusted_subnet {
        router = router.layer(axum::middleware::from_fn_with_state(
            subnet,
            middleware::filter_real_ip,
        ));
    }

    router
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}
