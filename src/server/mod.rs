//! HTTP surface: serve the publications of a directory as Readium Web
//! Publications.
//!
//! | Route                  | Response                                         |
//! |------------------------|--------------------------------------------------|
//! | `/health`              | `OK`                                             |
//! | `/list.json`           | `[{filename, path}]` of the served directory     |
//! | `/{id}/manifest.json`  | the publication manifest, with an `ETag`         |
//! | `/{id}/{asset}`        | a resource, with single `Range` support          |
//!
//! `id` is the unpadded base64url form of a path relative to the served
//! directory.

pub mod cache;
mod handlers;
mod store;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use log::info;
use tower_http::compression::CompressionLayer;
use tower_http::compression::predicate::{Predicate, SizeAbove};
use tower_http::timeout::TimeoutLayer;

use crate::error::Result;
use crate::streamer::InferA11y;

pub use handlers::{RangeRequest, parse_range};
pub use store::{ListEntry, OpenResult, PublicationStore};

/// Responses smaller than this are sent uncompressed.
const MIN_COMPRESSED_SIZE: u16 = 200;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory whose publications are served.
    pub base_directory: PathBuf,
    pub bind_address: SocketAddr,
    /// Indentation of JSON responses; compact when `None`.
    pub json_indent: Option<String>,
    pub infer_a11y: InferA11y,
    /// Number of open publications kept around.
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_directory: PathBuf::from("."),
            bind_address: SocketAddr::from(([127, 0, 0, 1], 15080)),
            json_indent: None,
            infer_a11y: InferA11y::default(),
            cache_capacity: 10,
            cache_ttl: Duration::from_secs(600),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    pub fn new(base_directory: impl Into<PathBuf>) -> Self {
        Self {
            base_directory: base_directory.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    store: Arc<PublicationStore>,
    config: Arc<ServerConfig>,
}

/// Routes serving `config.base_directory`.
pub fn router(config: ServerConfig) -> Router {
    let store = Arc::new(PublicationStore::new(&config));
    router_with_store(config, store)
}

/// Routes serving the publications of `store`.
///
/// Publication routes compress textual and font responses with gzip or
/// brotli; entries already stored with deflate are passed through as is.
pub fn router_with_store(config: ServerConfig, store: Arc<PublicationStore>) -> Router {
    let timeout = config.request_timeout;
    let compression = CompressionLayer::new()
        .compress_when(SizeAbove::new(MIN_COMPRESSED_SIZE).and(handlers::compressible));
    let publications = Router::new()
        .route("/{id}/manifest.json", get(handlers::manifest))
        .route("/{id}/{*asset}", get(handlers::asset))
        .layer(compression);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/list.json", get(handlers::list))
        .merge(publications)
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .with_state(AppState {
            store,
            config: Arc::new(config),
        })
}

/// Serve until interrupted with Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let address = config.bind_address;
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(
        "Serving {} on http://{}",
        config.base_directory.display(),
        listener.local_addr()?
    );
    axum::serve(listener, router(config))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}
