//! Port for handing dissolved-room cleanup to background workers.

use async_trait::async_trait;

use crate::domain::RoomCleanupJob;

use super::define_port_error;

define_port_error! {
    /// Errors raised when submitting a cleanup job.
    pub enum CleanupQueueError {
        /// The queue is shut down or its worker has gone away.
        Unavailable { message: String } => "cleanup queue unavailable: {message}",
        /// The queue refused the job, typically because it is full.
        Rejected { message: String } => "cleanup job rejected: {message}",
    }
}

/// Fire-and-forget submission of [`RoomCleanupJob`]s.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomCleanupQueue: Send + Sync {
    async fn enqueue(&self, job: RoomCleanupJob) -> Result<(), CleanupQueueError>;
}
