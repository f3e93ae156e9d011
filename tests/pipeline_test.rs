//! Pipeline scenario tests
//!
//! The orchestrator runs against in-process detector/classifier doubles, a
//! temporary result log and a `MemorySink`, so every assertion can look at
//! exactly what would have been persisted and alerted.

use async_trait::async_trait;
use axum::{Router, routing::post};
use bytes::Bytes;
use image::{Rgb, RgbImage};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

use leafwatch::alerts::{AlertMessage, AlertSink, DeliveryError, MemorySink};
use leafwatch::catalog::{Catalog, CatalogEntry};
use leafwatch::config::InferenceServiceConfig;
use leafwatch::imaging::Crop;
use leafwatch::inference::{
    ClassificationResult, Classifier, DetectedRegion, Detector, HostedClassifier, InferenceError,
};
use leafwatch::ledger::ResultLog;
use leafwatch::observability::Metrics;
use leafwatch::pipeline::{
    AlertStatus, JobState, Orchestrator, RegionOutcome, Stage, UploadJob,
};
use leafwatch::queue::JobBroker;
use leafwatch::worker::spawn_workers;

const RED: Rgb<u8> = Rgb([200, 30, 30]);
const GREEN: Rgb<u8> = Rgb([30, 200, 30]);

fn region(x: f64, y: f64, confidence: f64) -> DetectedRegion {
    DetectedRegion {
        x,
        y,
        width: 80.0,
        height: 60.0,
        confidence,
        class: Some("leaf".to_string()),
    }
}

fn job(camera: &str, color: Rgb<u8>) -> UploadJob {
    UploadJob::new(
        camera,
        Bytes::from_static(b"normalized-jpeg"),
        RgbImage::from_pixel(640, 640, color),
    )
}

fn catalog() -> Catalog {
    let entry = |codename: &str, disease: &str| CatalogEntry {
        codename: codename.to_string(),
        plant_name: "Tomato".to_string(),
        disease: disease.to_string(),
        description: "Reference text".to_string(),
        cure: "Remove affected leaves".to_string(),
    };

    Catalog::from_entries([entry("TomatoBlight", "Late Blight"), entry("Healthy", "healthy")])
        .unwrap()
}

/// Returns the same regions for every image
struct StaticDetector(Vec<DetectedRegion>);

#[async_trait]
impl Detector for StaticDetector {
    async fn detect(&self, _image: Bytes) -> Result<Vec<DetectedRegion>, InferenceError> {
        Ok(self.0.clone())
    }
}

struct FailingDetector;

#[async_trait]
impl Detector for FailingDetector {
    async fn detect(&self, _image: Bytes) -> Result<Vec<DetectedRegion>, InferenceError> {
        Err(InferenceError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        })
    }
}

/// Panics on the first image, then finds one region
struct PanickingDetector {
    calls: AtomicUsize,
}

#[async_trait]
impl Detector for PanickingDetector {
    async fn detect(&self, _image: Bytes) -> Result<Vec<DetectedRegion>, InferenceError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("detector bug");
        }
        Ok(vec![region(100.0, 100.0, 0.9)])
    }
}

struct SlowDetector(Duration);

#[async_trait]
impl Detector for SlowDetector {
    async fn detect(&self, _image: Bytes) -> Result<Vec<DetectedRegion>, InferenceError> {
        tokio::time::sleep(self.0).await;
        Ok(vec![region(100.0, 100.0, 0.9)])
    }
}

/// Answers labels in call order
struct ScriptedClassifier {
    labels: Vec<&'static str>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    fn new(labels: Vec<&'static str>) -> Self {
        Self {
            labels,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, _crop: &Crop) -> ClassificationResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.labels.get(call) {
            Some(label) => ClassificationResult::new(*label, 0.8765),
            None => ClassificationResult::unknown(),
        }
    }
}

/// Labels a crop by its pixel color: red leaves are blighted, green ones healthy
struct ColorClassifier;

#[async_trait]
impl Classifier for ColorClassifier {
    async fn classify(&self, crop: &Crop) -> ClassificationResult {
        tokio::time::sleep(Duration::from_millis(5)).await;
        match crop.image.get_pixel_checked(0, 0) {
            Some(pixel) if *pixel == RED => ClassificationResult::new("TomatoBlight", 0.9),
            Some(_) => ClassificationResult::new("Healthy", 0.9),
            None => ClassificationResult::unknown(),
        }
    }
}

/// First call answers at once, every later call hangs
struct StallingClassifier {
    calls: AtomicUsize,
}

#[async_trait]
impl Classifier for StallingClassifier {
    async fn classify(&self, _crop: &Crop) -> ClassificationResult {
        if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
        ClassificationResult::new("TomatoBlight", 0.7)
    }
}

/// Panics on the first call
struct PanickingClassifier {
    calls: AtomicUsize,
}

#[async_trait]
impl Classifier for PanickingClassifier {
    async fn classify(&self, _crop: &Crop) -> ClassificationResult {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("classifier bug");
        }
        ClassificationResult::new("Healthy", 0.6)
    }
}

struct FailingSink;

#[async_trait]
impl AlertSink for FailingSink {
    async fn dispatch(&self, _message: &AlertMessage) -> Result<(), DeliveryError> {
        Err(DeliveryError::Status(500))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

struct PanickingSink;

#[async_trait]
impl AlertSink for PanickingSink {
    async fn dispatch(&self, _message: &AlertMessage) -> Result<(), DeliveryError> {
        panic!("sink bug");
    }

    fn name(&self) -> &'static str {
        "panicking"
    }
}

struct Harness {
    orchestrator: Arc<Orchestrator>,
    ledger: Arc<ResultLog>,
    sink: Arc<MemorySink>,
    metrics: Arc<Metrics>,
    _temp_dir: TempDir,
}

fn harness(
    detector: impl Detector + 'static,
    classifier: impl Classifier + 'static,
    job_deadline: Duration,
) -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let ledger = Arc::new(ResultLog::open(temp_dir.path().join("results.csv")).unwrap());
    let sink = Arc::new(MemorySink::new());
    let metrics = Arc::new(Metrics::new());

    let orchestrator = Orchestrator::builder()
        .detector(Arc::new(detector))
        .classifier(Arc::new(classifier))
        .catalog(Arc::new(catalog()))
        .ledger(ledger.clone())
        .alerts(sink.clone())
        .metrics(metrics.clone())
        .job_deadline(job_deadline)
        .build();

    Harness {
        orchestrator: Arc::new(orchestrator),
        ledger,
        sink,
        metrics,
        _temp_dir: temp_dir,
    }
}

const DEADLINE: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_two_regions_one_alert() {
    let h = harness(
        StaticDetector(vec![
            region(100.0, 100.0, 0.9),
            region(300.0, 300.0, 0.7),
            region(500.0, 500.0, 0.3),
        ]),
        ScriptedClassifier::new(vec!["TomatoBlight", "Healthy"]),
        DEADLINE,
    );

    let report = h.orchestrator.run(job("Cam-A", GREEN)).await;

    assert_eq!(report.state, JobState::Done);
    assert_eq!(report.regions.len(), 2);
    assert_eq!(report.alerted(), 1);

    let records = h.ledger.read_all().await.unwrap();
    let labels: Vec<&str> = records.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, ["TomatoBlight", "Healthy"]);
    assert!(records.iter().all(|r| r.camera == "Cam-A"));
    assert_eq!(records[0].confidence, 87.65);

    let alerts = h.sink.messages();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].disease, "Late Blight");
    assert_eq!(alerts[0].camera, "Cam-A");
    assert_eq!(alerts[0].image_name, records[0].image_name);

    let metrics = h.metrics.snapshot();
    assert_eq!(metrics.jobs_completed, 1);
    assert_eq!(metrics.regions_classified, 2);
    assert_eq!(metrics.alerts_sent, 1);
}

#[tokio::test]
async fn test_no_regions_above_threshold() {
    let h = harness(
        StaticDetector(vec![region(100.0, 100.0, 0.5), region(200.0, 200.0, 0.1)]),
        ScriptedClassifier::new(vec!["TomatoBlight"]),
        DEADLINE,
    );

    let report = h.orchestrator.run(job("Cam-A", RED)).await;

    assert_eq!(report.state, JobState::Done);
    assert!(report.regions.is_empty());
    assert!(h.ledger.read_all().await.unwrap().is_empty());
    assert!(h.sink.messages().is_empty());
}

#[tokio::test]
async fn test_malformed_classifier_response_falls_back() {
    let app = Router::new().route(
        "/disease/1",
        post(|_body: Bytes| async { ([("content-type", "application/json")], "{not json") }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut config = InferenceServiceConfig::new("disease");
    config.endpoint = format!("http://{addr}");
    let classifier = HostedClassifier::from_config(&config, 75).unwrap();

    let h = harness(
        StaticDetector(vec![region(100.0, 100.0, 0.9)]),
        classifier,
        DEADLINE,
    );

    let report = h.orchestrator.run(job("Cam-A", RED)).await;

    assert_eq!(report.state, JobState::Done);
    let records = h.ledger.read_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].label, "Unknown");
    assert_eq!(records[0].confidence, 0.0);
    assert!(h.sink.messages().is_empty());
}

#[tokio::test]
async fn test_concurrent_jobs_keep_their_camera() {
    let h = harness(
        StaticDetector(vec![region(320.0, 320.0, 0.95)]),
        ColorClassifier,
        DEADLINE,
    );

    let (a, b) = tokio::join!(
        h.orchestrator.run(job("Cam-A", RED)),
        h.orchestrator.run(job("Cam-B", GREEN)),
    );
    assert_eq!(a.state, JobState::Done);
    assert_eq!(b.state, JobState::Done);

    let records = h.ledger.read_all().await.unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        match record.camera.as_str() {
            "Cam-A" => assert_eq!(record.label, "TomatoBlight"),
            "Cam-B" => assert_eq!(record.label, "Healthy"),
            other => panic!("unexpected camera {other}"),
        }
    }

    let alerts = h.sink.messages();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].camera, "Cam-A");
}

#[tokio::test]
async fn test_detector_failure_fails_job() {
    let h = harness(
        FailingDetector,
        ScriptedClassifier::new(vec!["TomatoBlight"]),
        DEADLINE,
    );

    let report = h.orchestrator.run(job("Cam-A", RED)).await;

    assert_eq!(report.state, JobState::Failed);
    assert!(report.regions.is_empty());
    assert!(report.error.unwrap().contains("502"));
    assert!(h.ledger.read_all().await.unwrap().is_empty());
    assert!(h.sink.messages().is_empty());
    assert_eq!(h.metrics.snapshot().jobs_failed, 1);
}

#[tokio::test]
async fn test_detector_past_deadline_fails_job() {
    let h = harness(
        SlowDetector(Duration::from_secs(5)),
        ScriptedClassifier::new(vec!["TomatoBlight"]),
        Duration::from_millis(50),
    );

    let report = h.orchestrator.run(job("Cam-A", RED)).await;

    assert_eq!(report.state, JobState::Failed);
    assert!(h.ledger.read_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deadline_degrades_then_skips_regions() {
    let h = harness(
        StaticDetector(vec![
            region(100.0, 100.0, 0.9),
            region(300.0, 300.0, 0.9),
            region(500.0, 500.0, 0.9),
        ]),
        StallingClassifier {
            calls: AtomicUsize::new(0),
        },
        Duration::from_millis(200),
    );

    let report = h.orchestrator.run(job("Cam-A", RED)).await;

    assert_eq!(report.state, JobState::Done);
    assert!(matches!(
        &report.regions[0].outcome,
        RegionOutcome::Recorded { label, .. } if label == "TomatoBlight"
    ));
    assert!(matches!(
        &report.regions[1].outcome,
        RegionOutcome::Recorded { label, confidence, .. } if label == "Unknown" && *confidence == 0.0
    ));
    assert_eq!(report.regions[2].outcome, RegionOutcome::Skipped);

    assert_eq!(h.ledger.read_all().await.unwrap().len(), 2);
    assert_eq!(h.metrics.snapshot().regions_skipped, 1);
}

#[tokio::test]
async fn test_region_failure_does_not_stop_siblings() {
    let h = harness(
        StaticDetector(vec![region(100.0, 100.0, 0.9), region(300.0, 300.0, 0.8)]),
        PanickingClassifier {
            calls: AtomicUsize::new(0),
        },
        DEADLINE,
    );

    let report = h.orchestrator.run(job("Cam-A", GREEN)).await;

    assert_eq!(report.state, JobState::Done);
    assert!(matches!(
        report.regions[0].outcome,
        RegionOutcome::Failed {
            stage: Stage::Classifying,
            ..
        }
    ));
    assert!(matches!(
        &report.regions[1].outcome,
        RegionOutcome::Recorded { label, .. } if label == "Healthy"
    ));

    let records = h.ledger.read_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(h.metrics.snapshot().region_failures, 1);
}

#[tokio::test]
async fn test_alert_failure_keeps_record() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = Arc::new(ResultLog::open(temp_dir.path().join("results.csv")).unwrap());
    let metrics = Arc::new(Metrics::new());

    let orchestrator = Orchestrator::builder()
        .detector(Arc::new(StaticDetector(vec![region(100.0, 100.0, 0.9)])))
        .classifier(Arc::new(ScriptedClassifier::new(vec!["TomatoBlight"])))
        .catalog(Arc::new(catalog()))
        .ledger(ledger.clone())
        .alerts(Arc::new(FailingSink))
        .metrics(metrics.clone())
        .build();

    let report = orchestrator.run(job("Cam-A", RED)).await;

    assert!(matches!(
        &report.regions[0].outcome,
        RegionOutcome::Recorded { alert: AlertStatus::Failed(_), .. }
    ));
    assert_eq!(ledger.read_all().await.unwrap().len(), 1);
    assert_eq!(metrics.snapshot().alerts_failed, 1);
}

#[tokio::test]
async fn test_worker_pool_drains_backlog() {
    let h = harness(
        StaticDetector(vec![region(100.0, 100.0, 0.9), region(400.0, 400.0, 0.9)]),
        ColorClassifier,
        DEADLINE,
    );

    let (broker, receivers) = JobBroker::new(3, 4);
    let workers = spawn_workers(receivers, h.orchestrator.clone());

    for i in 0..6 {
        broker.enqueue(job(&format!("Cam-{i}"), GREEN)).unwrap();
    }

    // Closing the channels lets each worker finish what it holds, then exit
    drop(broker);
    for worker in workers {
        worker.await.unwrap();
    }

    let records = h.ledger.read_all().await.unwrap();
    assert_eq!(records.len(), 12);
    for i in 0..6 {
        let camera = format!("Cam-{i}");
        assert_eq!(records.iter().filter(|r| r.camera == camera).count(), 2);
    }
    assert_eq!(h.metrics.snapshot().jobs_completed, 6);
}

#[tokio::test]
async fn test_alert_panic_keeps_worker_running() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = Arc::new(ResultLog::open(temp_dir.path().join("results.csv")).unwrap());
    let metrics = Arc::new(Metrics::new());

    let orchestrator = Orchestrator::builder()
        .detector(Arc::new(StaticDetector(vec![region(100.0, 100.0, 0.9)])))
        .classifier(Arc::new(ColorClassifier))
        .catalog(Arc::new(catalog()))
        .ledger(ledger.clone())
        .alerts(Arc::new(PanickingSink))
        .metrics(metrics.clone())
        .build();
    let orchestrator = Arc::new(orchestrator);

    let report = orchestrator.run(job("Cam-A", RED)).await;
    assert_eq!(report.state, JobState::Done);
    assert!(matches!(
        &report.regions[0].outcome,
        RegionOutcome::Recorded { alert: AlertStatus::Failed(_), .. }
    ));

    // One worker with a backlog behind the panicking sink
    let (broker, receivers) = JobBroker::new(1, 4);
    let workers = spawn_workers(receivers, orchestrator);
    for i in 0..3 {
        broker.enqueue(job(&format!("Cam-{i}"), RED)).unwrap();
    }

    drop(broker);
    for worker in workers {
        worker.await.unwrap();
    }

    assert_eq!(ledger.read_all().await.unwrap().len(), 4);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.jobs_completed, 4);
    assert_eq!(snapshot.alerts_failed, 4);
}

#[tokio::test]
async fn test_panicking_job_does_not_lose_backlog() {
    let h = harness(
        PanickingDetector {
            calls: AtomicUsize::new(0),
        },
        ColorClassifier,
        DEADLINE,
    );

    let (broker, receivers) = JobBroker::new(1, 4);
    let workers = spawn_workers(receivers, h.orchestrator.clone());
    for i in 0..3 {
        broker.enqueue(job(&format!("Cam-{i}"), GREEN)).unwrap();
    }

    drop(broker);
    for worker in workers {
        worker.await.unwrap();
    }

    let cameras: Vec<String> = h
        .ledger
        .read_all()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.camera)
        .collect();
    assert_eq!(cameras, ["Cam-1", "Cam-2"]);
    assert_eq!(h.metrics.snapshot().jobs_completed, 2);
}
