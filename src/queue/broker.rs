use crate::pipeline::UploadJob;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::mpsc::{self, OwnedPermit, error::TrySendError};
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("All worker queues are full")]
    Full,

    #[error("All workers have stopped")]
    Closed,
}

/// JobEnvelope wraps an UploadJob with its sequence number
#[derive(Debug)]
pub struct JobEnvelope {
    pub seq: u64,
    pub job: UploadJob,
}

/// Capacity reserved on one worker's channel
///
/// Holding a slot guarantees the job can be handed off without waiting.
/// Dropping it unused gives the capacity back.
#[derive(Debug)]
pub struct JobSlot {
    permit: OwnedPermit<JobEnvelope>,
    seq: u64,
    worker_idx: usize,
}

impl JobSlot {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn worker_idx(&self) -> usize {
        self.worker_idx
    }

    pub fn send(self, job: UploadJob) {
        debug!(seq = self.seq, worker_idx = self.worker_idx, image_id = %job.image_id, "Job sent to worker");
        self.permit.send(JobEnvelope { seq: self.seq, job });
    }
}

/// JobBroker distributes accepted uploads across the worker pool
///
/// Each worker owns one bounded channel. Jobs go round-robin; when the next
/// worker's channel is full the remaining workers are tried once each before
/// the upload is rejected with [`QueueError::Full`].
pub struct JobBroker {
    worker_channels: Vec<mpsc::Sender<JobEnvelope>>,
    next_worker: AtomicUsize,
    next_seq: AtomicU64,
}

impl JobBroker {
    /// Create a new JobBroker with worker channels
    ///
    /// Returns the broker and one receiver per worker.
    pub fn new(num_workers: usize, channel_size: usize) -> (Self, Vec<mpsc::Receiver<JobEnvelope>>) {
        info!(num_workers, channel_size, "Creating JobBroker with worker channels");

        let mut worker_channels = Vec::with_capacity(num_workers);
        let mut worker_receivers = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let (tx, rx) = mpsc::channel(channel_size.max(1));
            worker_channels.push(tx);
            worker_receivers.push(rx);
            debug!(worker_id, "Created worker channel");
        }

        let broker = Self {
            worker_channels,
            next_worker: AtomicUsize::new(0),
            next_seq: AtomicU64::new(0),
        };

        (broker, worker_receivers)
    }

    /// Reserve capacity for one job without waiting
    pub fn reserve(&self) -> Result<JobSlot, QueueError> {
        let workers = self.worker_channels.len();
        if workers == 0 {
            return Err(QueueError::Closed);
        }

        let start = self.next_worker.fetch_add(1, Ordering::Relaxed);
        let mut closed = 0;

        for offset in 0..workers {
            let worker_idx = (start + offset) % workers;
            match self.worker_channels[worker_idx].clone().try_reserve_owned() {
                Ok(permit) => {
                    let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                    return Ok(JobSlot {
                        permit,
                        seq,
                        worker_idx,
                    });
                }
                Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => closed += 1,
            }
        }

        if closed == workers {
            Err(QueueError::Closed)
        } else {
            Err(QueueError::Full)
        }
    }

    /// Reserve and send in one step
    pub fn enqueue(&self, job: UploadJob) -> Result<u64, QueueError> {
        let slot = self.reserve()?;
        let seq = slot.seq();
        slot.send(job);
        Ok(seq)
    }

    /// Get number of workers
    pub fn num_workers(&self) -> usize {
        self.worker_channels.len()
    }

    /// Jobs waiting across all worker channels
    pub fn backlog(&self) -> usize {
        self.worker_channels
            .iter()
            .map(|ch| ch.max_capacity() - ch.capacity())
            .sum()
    }

    /// Check if all worker channels are healthy (not closed)
    pub fn health_check(&self) -> bool {
        self.worker_channels.iter().all(|ch| !ch.is_closed())
    }
}
