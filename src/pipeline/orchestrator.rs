use bon::Builder;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, warn};

use super::job::{
    AlertStatus, JobReport, JobState, MIN_REGION_CONFIDENCE, RegionOutcome, RegionReport, Stage,
    UploadJob,
};
use crate::alerts::{AlertMessage, AlertSink};
use crate::catalog::Catalog;
use crate::imaging::crop_region;
use crate::inference::{ClassificationResult, Classifier, DetectedRegion, Detector};
use crate::ledger::{LogRecord, ResultLog};
use crate::observability::Metrics;

/// Drives one upload through detection, per-region classification, logging and alerting
///
/// Regions run one after another; a failure in one region is recorded in the
/// report and the next region still runs. Only detection can fail the job.
#[derive(Builder)]
pub struct Orchestrator {
    detector: Arc<dyn Detector>,
    classifier: Arc<dyn Classifier>,
    catalog: Arc<Catalog>,
    ledger: Arc<ResultLog>,
    alerts: Arc<dyn AlertSink>,
    #[builder(default)]
    metrics: Arc<Metrics>,
    /// Overall budget per job, measured from the start of `run`
    #[builder(default = Duration::from_secs(120))]
    job_deadline: Duration,
}

/// Regions worth cropping, in detector order
pub fn accepted_regions(regions: Vec<DetectedRegion>) -> Vec<DetectedRegion> {
    regions
        .into_iter()
        .filter(|r| r.confidence > MIN_REGION_CONFIDENCE && r.has_area())
        .collect()
}

impl Orchestrator {
    pub async fn run(&self, job: UploadJob) -> JobReport {
        let deadline = Instant::now() + self.job_deadline;
        let mut state = JobState::Received;
        debug!(image_id = %job.image_id, camera = %job.camera, ?state, "Job started");

        state = JobState::Detecting;
        let detected = match timeout_at(deadline, self.detector.detect(job.image.clone())).await {
            Ok(Ok(regions)) => regions,
            Ok(Err(e)) => return self.fail(&job, e.to_string()),
            Err(_) => return self.fail(&job, "detection exceeded job deadline".to_string()),
        };

        let total = detected.len();
        let regions = accepted_regions(detected);
        debug!(
            image_id = %job.image_id,
            ?state,
            detected = total,
            accepted = regions.len(),
            "Detection finished"
        );

        let mut reports = Vec::with_capacity(regions.len());
        for (index, region) in regions.into_iter().enumerate() {
            let outcome = if Instant::now() >= deadline {
                warn!(image_id = %job.image_id, camera = %job.camera, region = index, "Job deadline passed, region skipped");
                self.metrics.region_skipped();
                RegionOutcome::Skipped
            } else {
                self.process_region(&job, index, region, deadline).await
            };
            reports.push(RegionReport { index, outcome });
        }

        state = JobState::Done;
        self.metrics.job_completed();

        let report = JobReport {
            image_id: job.image_id,
            camera: job.camera,
            state,
            regions: reports,
            error: None,
        };

        info!(
            image_id = %report.image_id,
            camera = %report.camera,
            regions = report.regions.len(),
            recorded = report.recorded(),
            alerted = report.alerted(),
            skipped = report.skipped(),
            "Job done"
        );

        report
    }

    fn fail(&self, job: &UploadJob, reason: String) -> JobReport {
        error!(image_id = %job.image_id, camera = %job.camera, error = %reason, "Detection failed, job aborted");
        self.metrics.job_failed();

        JobReport {
            image_id: job.image_id,
            camera: job.camera.clone(),
            state: JobState::Failed,
            regions: Vec::new(),
            error: Some(reason),
        }
    }

    async fn process_region(
        &self,
        job: &UploadJob,
        index: usize,
        region: DetectedRegion,
        deadline: Instant,
    ) -> RegionOutcome {
        let crop = crop_region(&job.pixels, &region);
        if crop.is_empty() {
            debug!(image_id = %job.image_id, region = index, "Region collapsed to an empty crop");
        }

        // Own task so a panicking classifier only fails this region
        let classifier = Arc::clone(&self.classifier);
        let mut task = tokio::spawn(async move { classifier.classify(&crop).await });

        let result = match timeout_at(deadline, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(image_id = %job.image_id, camera = %job.camera, region = index, error = %e, "Classification task aborted");
                self.metrics.region_failed();
                return RegionOutcome::Failed {
                    stage: Stage::Classifying,
                    error: e.to_string(),
                };
            }
            Err(_) => {
                task.abort();
                warn!(image_id = %job.image_id, camera = %job.camera, region = index, "Classification exceeded job deadline, using fallback classification");
                ClassificationResult::unknown()
            }
        };

        let record = LogRecord::new(Utc::now(), &result, &job.image_name, &job.camera);
        if let Err(e) = self.ledger.append(&record).await {
            error!(image_id = %job.image_id, camera = %job.camera, region = index, error = %e, "Failed to append result, record lost");
            self.metrics.region_failed();
            return RegionOutcome::Failed {
                stage: Stage::Logging,
                error: e.to_string(),
            };
        }
        self.metrics.region_classified();

        let lookup = self.catalog.lookup(&record.label);
        let alert = if lookup.is_alertable() {
            let message = AlertMessage::new(&record, lookup.entry());
            let alerts = Arc::clone(&self.alerts);
            let delivery = tokio::spawn(async move { alerts.dispatch(&message).await }).await;

            match delivery {
                Ok(Ok(())) => {
                    self.metrics.alert_sent();
                    AlertStatus::Sent
                }
                Ok(Err(e)) => {
                    warn!(image_id = %job.image_id, camera = %job.camera, region = index, error = %e, "Alert delivery failed");
                    self.metrics.alert_failed();
                    AlertStatus::Failed(e.to_string())
                }
                Err(e) => {
                    error!(image_id = %job.image_id, camera = %job.camera, region = index, error = %e, "Alert task aborted");
                    self.metrics.alert_failed();
                    AlertStatus::Failed(e.to_string())
                }
            }
        } else {
            AlertStatus::NotRequired
        };

        RegionOutcome::Recorded {
            label: record.label,
            confidence: result.confidence,
            alert,
        }
    }
}
