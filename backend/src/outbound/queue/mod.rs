//! Tokio-backed cleanup queue.
//!
//! A bounded `mpsc` channel feeds one background task that runs
//! [`RoomCleanupWorker::process`] for each job. Submission never waits: a
//! full channel rejects the job, and a closed one reports the queue as
//! unavailable. The engines log either outcome and carry on.
//!
//! [`CleanupQueueHandle::shutdown`] stops intake, lets the worker drain what
//! is already queued, and waits for it to finish.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::ports::{CleanupQueueError, RoomCleanupQueue};
use crate::domain::{RoomCleanupJob, RoomCleanupWorker};

/// Sending half of the cleanup queue.
#[derive(Debug, Clone)]
pub struct TokioRoomCleanupQueue {
    sender: mpsc::Sender<RoomCleanupJob>,
}

/// Owns the worker task; dropping it leaves the worker running until every
/// sender is gone.
#[derive(Debug)]
pub struct CleanupQueueHandle {
    stop: Arc<Notify>,
    worker: JoinHandle<usize>,
}

impl TokioRoomCleanupQueue {
    /// Spawn the worker on the current runtime.
    ///
    /// `capacity` is clamped to at least one slot.
    pub fn spawn(worker: RoomCleanupWorker, capacity: usize) -> (Self, CleanupQueueHandle) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let stop = Arc::new(Notify::new());
        let task = tokio::spawn(drain(worker, receiver, Arc::clone(&stop)));
        (
            Self { sender },
            CleanupQueueHandle { stop, worker: task },
        )
    }
}

#[async_trait]
impl RoomCleanupQueue for TokioRoomCleanupQueue {
    async fn enqueue(&self, job: RoomCleanupJob) -> Result<(), CleanupQueueError> {
        let room_id = job.room_id;
        self.sender.try_send(job).map_err(|error| match error {
            mpsc::error::TrySendError::Full(_) => {
                CleanupQueueError::rejected(format!("queue full, dropping cleanup of {room_id}"))
            }
            mpsc::error::TrySendError::Closed(_) => {
                CleanupQueueError::unavailable(format!("worker stopped before cleanup of {room_id}"))
            }
        })
    }
}

impl CleanupQueueHandle {
    /// Stop accepting jobs, finish the queued ones, and return how many jobs
    /// the worker processed over its lifetime.
    pub async fn shutdown(self) -> usize {
        self.stop.notify_one();
        match self.worker.await {
            Ok(processed) => processed,
            Err(error) => {
                warn!(%error, "cleanup worker did not shut down cleanly");
                0
            }
        }
    }
}

async fn drain(
    worker: RoomCleanupWorker,
    mut receiver: mpsc::Receiver<RoomCleanupJob>,
    stop: Arc<Notify>,
) -> usize {
    let mut processed = 0;
    loop {
        tokio::select! {
            biased;
            () = stop.notified() => {
                receiver.close();
                break;
            }
            job = receiver.recv() => match job {
                Some(job) => {
                    run_job(&worker, &job).await;
                    processed += 1;
                }
                None => break,
            },
        }
    }
    while let Some(job) = receiver.recv().await {
        run_job(&worker, &job).await;
        processed += 1;
    }
    info!(processed, "cleanup worker stopped");
    processed
}

async fn run_job(worker: &RoomCleanupWorker, job: &RoomCleanupJob) {
    match worker.process(job).await {
        Ok(report) => debug!(
            room_id = %job.room_id,
            trace_id = %job.trace_id,
            lists_removed = report.lists_removed,
            "cleanup job done"
        ),
        Err(error) => warn!(
            room_id = %job.room_id,
            trace_id = %job.trace_id,
            %error,
            "cleanup job failed"
        ),
    }
}
