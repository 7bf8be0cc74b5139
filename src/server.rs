//! Internal metrics server.
//!
//! Exposes a single read-only endpoint returning a JSON
//! [`MetricsSnapshot`](crate::internal::MetricsSnapshot). Every request builds
//! a fresh snapshot; nothing is cached between requests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use thiserror::Error;
use tokio::sync::Mutex;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::handler::Handler;
use crate::internal::{MetricsSnapshot, build_snapshot};

/// Default internal metrics port.
pub const DEFAULT_PORT: u16 = 19090;

/// Path of the internal metrics endpoint.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Errors from running the internal server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Could not bind the listening socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    /// The blocking snapshot task was cancelled before it finished.
    #[error("snapshot task failed: {0}")]
    Snapshot(#[from] tokio::task::JoinError),
}

/// Shared state of the internal server.
#[derive(Clone)]
pub struct InternalServer {
    handlers: Arc<[Arc<dyn Handler>]>,
    /// Serializes snapshots so handlers are queried by one request at a time.
    snapshot_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for InternalServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.handlers.iter().map(|h| h.name()).collect();
        f.debug_struct("InternalServer")
            .field("handlers", &names)
            .finish_non_exhaustive()
    }
}

impl InternalServer {
    /// Create server state over the active handlers, in registration order.
    pub fn new(handlers: Vec<Arc<dyn Handler>>) -> Self {
        Self {
            handlers: handlers.into(),
            snapshot_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Build one snapshot, waiting for any snapshot already in progress.
    ///
    /// Handlers report synchronously, so the snapshot is built on the
    /// blocking pool. The lock is held until it completes. A panicking
    /// handler is propagated to the caller.
    ///
    /// # Errors
    /// `ServerError::Snapshot` if the blocking task was cancelled, which only
    /// happens while the runtime shuts down.
    pub async fn snapshot(&self) -> Result<MetricsSnapshot, ServerError> {
        let _guard = self.snapshot_lock.lock().await;
        tracing::debug!(
            handlers = self.handlers.len(),
            "Starting to handle request for internal metrics"
        );

        let handlers = Arc::clone(&self.handlers);
        match tokio::task::spawn_blocking(move || build_snapshot(&handlers)).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => match e.try_into_panic() {
                Ok(panic) => std::panic::resume_unwind(panic),
                Err(e) => Err(e.into()),
            },
        }
    }
}

/// Create the Axum router serving the internal metrics endpoint.
pub fn create_router(server: InternalServer) -> Router {
    Router::new()
        .route(DEFAULT_METRICS_PATH, get(internal_metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(server)
}

/// Internal metrics endpoint.
async fn internal_metrics_handler(
    State(server): State<InternalServer>,
) -> Result<Json<MetricsSnapshot>, StatusCode> {
    server.snapshot().await.map(Json).map_err(|e| {
        tracing::error!(error = %e, "Failed to build internal metrics snapshot");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Serve the internal metrics endpoint on `0.0.0.0:port` until the task is
/// dropped.
pub async fn run_server(port: u16, handlers: Vec<Arc<dyn Handler>>) -> Result<(), ServerError> {
    serve_with_shutdown(port, handlers, std::future::pending()).await
}

/// Serve the internal metrics endpoint until `shutdown` resolves.
pub async fn serve_with_shutdown<F>(
    port: u16,
    handlers: Vec<Arc<dyn Handler>>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    tracing::info!(%addr, path = DEFAULT_METRICS_PATH, "Internal metrics server listening");

    axum::serve(listener, create_router(InternalServer::new(handlers)))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Internal metrics server stopped");
    Ok(())
}
