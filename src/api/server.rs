use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::{
    services::{get_image, health, recent_results, upload_image},
    state::AppState,
};
use crate::alerts::{self, AlertSink};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::inference::{Classifier, Detector, HostedClassifier, HostedDetector};
use crate::ledger::ResultLog;
use crate::observability::Metrics;
use crate::pipeline::Orchestrator;
use crate::queue::JobBroker;
use crate::storage::StorageClient;
use crate::worker::spawn_workers;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// External collaborators the pipeline is assembled from
pub struct Components {
    pub detector: Arc<dyn Detector>,
    pub classifier: Arc<dyn Classifier>,
    pub alerts: Arc<dyn AlertSink>,
    pub storage: Arc<StorageClient>,
    pub catalog: Arc<Catalog>,
    pub ledger: Arc<ResultLog>,
}

impl Components {
    /// Open the configured files and storage and build the hosted inference clients
    pub fn from_config(config: &Config) -> Result<Self, AnyError> {
        info!(path = %config.catalog.path.display(), "Loading catalog");
        let catalog = Catalog::load(&config.catalog.path)
            .map_err(|e| format!("Failed to load catalog: {}", e))?;

        let ledger = ResultLog::open(&config.ledger.path)
            .map_err(|e| format!("Failed to open result log: {}", e))?;

        info!(provider = ?config.storage.provider, root = %config.storage.root.display(), "Opening image storage");
        let storage = StorageClient::from_config(&config.storage)
            .map_err(|e| format!("Failed to open storage: {}", e))?;

        if config.detector.api_key.is_none() || config.classifier.api_key.is_none() {
            warn!("Inference API key not set, hosted calls will likely be rejected");
        }
        let detector = HostedDetector::from_config(&config.detector)?;
        let classifier = HostedClassifier::from_config(&config.classifier, config.imaging.jpeg_quality)?;
        let alerts = alerts::from_config(&config.alerts)?;

        Ok(Self {
            detector: Arc::new(detector),
            classifier: Arc::new(classifier),
            alerts: Arc::from(alerts),
            storage: Arc::new(storage),
            catalog: Arc::new(catalog),
            ledger: Arc::new(ledger),
        })
    }
}

/// Build the orchestrator, start the worker pool and return the shared API state
///
/// Workers exit once every clone of the returned state has been dropped and
/// their backlog is processed.
pub fn start(config: Config, components: Components) -> (AppState, Vec<JoinHandle<()>>) {
    let metrics = Arc::new(Metrics::new());
    let alert_sink = components.alerts.name();

    let orchestrator = Orchestrator::builder()
        .detector(components.detector)
        .classifier(components.classifier)
        .catalog(Arc::clone(&components.catalog))
        .ledger(Arc::clone(&components.ledger))
        .alerts(components.alerts)
        .metrics(Arc::clone(&metrics))
        .job_deadline(config.pipeline.job_deadline())
        .build();

    let (broker, receivers) = JobBroker::new(config.pipeline.workers, config.pipeline.queue_depth);
    let workers = spawn_workers(receivers, Arc::new(orchestrator));

    let state = AppState::new(
        Arc::new(config),
        Arc::new(broker),
        components.storage,
        components.ledger,
        components.catalog,
        metrics,
        alert_sink,
    );

    (state, workers)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/upload", post(upload_image))
        .route("/api/results", get(recent_results))
        .route("/images/{name}", get(get_image))
        .route("/health", get(health))
        .with_state(state)
        // Transparently decompress gzip request bodies (Content-Encoding)
        .layer(RequestDecompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

pub async fn run(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address.unwrap_or(config.server.bind_addr);
    let components = Components::from_config(&config)?;
    let (state, workers) = start(config, components);

    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Leafwatch API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and with it the broker) is gone; workers finish their backlog
    info!(workers = workers.len(), "Waiting for workers to drain");
    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "Worker task ended abnormally");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
