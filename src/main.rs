//! gatherd Binary Entry Point
//!
//! Loads the configuration, starts every configured collector on its own
//! interval, drains their conduits into a logging handler and serves the
//! internal metrics endpoint. Core functionality lives in the `gatherd`
//! library crate.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use clap::Parser;
use gatherd::collector::{Collector, CollectorError, HEARTBEAT_COLLECTOR, HeartbeatCollector};
use gatherd::{CollectorRegistry, Config, Handler, InternalMetrics, Metric, MetricReceiver};
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// gatherd - metrics collection agent
#[derive(Parser, Debug)]
#[command(name = "gatherd", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/gatherd.json",
        env = "GATHERD_CONFIG"
    )]
    config: String,

    /// Internal metrics port (overrides config file)
    #[arg(long, env = "GATHERD_INTERNAL_PORT")]
    port: Option<u16>,
}

/// Handler that logs every metric it receives and counts them.
#[derive(Debug, Default)]
struct LogHandler {
    emitted: AtomicU64,
    collectors: AtomicUsize,
}

impl LogHandler {
    fn handle(&self, metric: &Metric) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            metric = %metric.name,
            value = metric.value,
            metric_type = %metric.metric_type,
            dimensions = ?metric.dimensions,
            "Metric received"
        );
    }
}

impl Handler for LogHandler {
    fn name(&self) -> &str {
        "log"
    }

    fn internal_metrics(&self) -> InternalMetrics {
        InternalMetrics::new()
            .with_counter("emitted", self.emitted.load(Ordering::Relaxed) as f64)
            .with_gauge("collectors", self.collectors.load(Ordering::Relaxed) as f64)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gatherd=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    gatherd::internal::mark_started();
    tracing::info!("gatherd - metrics collection agent");

    let cli = Cli::parse();

    // A failed load aborts startup; no partial configuration is used.
    let config = Config::load(&cli.config)?;
    let port = cli.port.unwrap_or_else(|| config.internal_metrics_port());

    let mut registry = CollectorRegistry::new().with_default_interval(config.interval());
    registry.register(HEARTBEAT_COLLECTOR, HeartbeatCollector::factory);
    tracing::info!(collectors = ?registry.names(), "Collector registry ready");

    let collectors = registry.build_all(&config.collectors);
    if collectors.is_empty() {
        tracing::warn!("No collectors configured");
    }

    let log_handler = Arc::new(LogHandler::default());
    log_handler
        .collectors
        .store(collectors.len(), Ordering::Relaxed);

    let mut tasks = JoinSet::new();
    for mut collector in collectors {
        let Some(receiver) = collector.state_mut().take_channel() else {
            tracing::warn!(collector = %collector.state().canonical_name(), "Conduit already taken, skipping collector");
            continue;
        };
        tasks.spawn(drain(
            receiver,
            config.default_dimensions.clone(),
            Arc::clone(&log_handler),
        ));
        tasks.spawn(run_collector(collector));
    }

    let handlers: Vec<Arc<dyn Handler>> = vec![log_handler];
    gatherd::server::serve_with_shutdown(port, handlers, shutdown_signal()).await?;

    tracing::info!("Stopping collectors...");
    tasks.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Run one collector on its own interval.
///
/// A single task per collector means a collector is never run concurrently
/// with itself.
async fn run_collector(mut collector: Box<dyn Collector>) {
    let name = collector.state().canonical_name().to_string();
    let period = Duration::from_secs(collector.state().interval());
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(collector = %name, interval = ?period, "Collector started");
    loop {
        ticker.tick().await;
        match collector.collect().await {
            Ok(()) => tracing::trace!(collector = %name, "Collection completed"),
            Err(CollectorError::ChannelClosed) => {
                tracing::error!(collector = %name, "Metric channel closed, stopping collector");
                break;
            }
            Err(e) => tracing::error!(collector = %name, error = %e, "Collection failed"),
        }
    }
}

/// Drain a collector's conduit into the handler.
async fn drain(
    receiver: MetricReceiver,
    default_dimensions: BTreeMap<String, String>,
    handler: Arc<LogHandler>,
) {
    while let Ok(mut metric) = receiver.recv_async().await {
        metric.add_dimensions(&default_dimensions);
        handler.handle(&metric);
    }
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
