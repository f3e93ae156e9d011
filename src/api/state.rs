use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::ingest::Intake;
use crate::ledger::ResultLog;
use crate::observability::Metrics;
use crate::queue::JobBroker;
use crate::storage::StorageClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub intake: Intake,
    pub broker: Arc<JobBroker>,
    pub storage: Arc<StorageClient>,
    pub ledger: Arc<ResultLog>,
    pub catalog: Arc<Catalog>,
    pub metrics: Arc<Metrics>,
    /// Name of the alert sink in use, reported on `/health`
    pub alert_sink: &'static str,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        broker: Arc<JobBroker>,
        storage: Arc<StorageClient>,
        ledger: Arc<ResultLog>,
        catalog: Arc<Catalog>,
        metrics: Arc<Metrics>,
        alert_sink: &'static str,
    ) -> Self {
        let intake = Intake::new(
            Arc::clone(&broker),
            Arc::clone(&storage),
            Arc::clone(&metrics),
            config.imaging.clone(),
            config.server.api.max_camera_id_len,
        );

        Self {
            config,
            intake,
            broker,
            storage,
            ledger,
            catalog,
            metrics,
            alert_sink,
        }
    }
}
