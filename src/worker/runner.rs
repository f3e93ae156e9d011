//! Job runner - drains one worker channel through the orchestrator

use crate::pipeline::Orchestrator;
use crate::queue::JobEnvelope;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Run jobs from `rx` one at a time until the channel closes and its backlog is empty
pub async fn run_worker(
    worker_id: usize,
    mut rx: mpsc::Receiver<JobEnvelope>,
    orchestrator: Arc<Orchestrator>,
) {
    info!(worker_id, "Worker started");

    while let Some(JobEnvelope { seq, job }) = rx.recv().await {
        let image_id = job.image_id;
        debug!(worker_id, seq, %image_id, "Job received");

        // A panicking job must not take the worker and its backlog with it
        let job_orchestrator = Arc::clone(&orchestrator);
        match tokio::spawn(async move { job_orchestrator.run(job).await }).await {
            Ok(report) => debug!(worker_id, seq, state = ?report.state, "Job finished"),
            Err(e) => error!(worker_id, seq, %image_id, error = %e, "Job aborted"),
        }
    }

    info!(worker_id, "Worker channel closed, exiting");
}

/// Spawn one task per receiver
pub fn spawn_workers(
    receivers: Vec<mpsc::Receiver<JobEnvelope>>,
    orchestrator: Arc<Orchestrator>,
) -> Vec<JoinHandle<()>> {
    receivers
        .into_iter()
        .enumerate()
        .map(|(worker_id, rx)| tokio::spawn(run_worker(worker_id, rx, Arc::clone(&orchestrator))))
        .collect()
}
