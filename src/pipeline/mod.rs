//! Background processing of accepted uploads
//!
//! `Received -> Detecting -> (per region: crop, classify, log, alert) -> Done`,
//! or `Failed` when detection does not succeed within the job deadline.

mod job;
mod orchestrator;

pub use job::{
    AlertStatus, DEFAULT_CAMERA, JobReport, JobState, MIN_REGION_CONFIDENCE, RegionOutcome,
    RegionReport, Stage, UploadJob, image_name_for,
};
pub use orchestrator::{Orchestrator, accepted_regions};
