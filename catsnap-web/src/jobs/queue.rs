//! In-process job queue
//!
//! Delaying a job reserves a slot in a bounded channel without sending
//! anything. Confirming the ticket sends the job to the workers; revoking it
//! gives the slot back. A job is therefore never runnable before the request
//! that delayed it has committed.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError, OwnedPermit};
use tracing::debug;
use uuid::Uuid;

use super::Job;

/// Queue side of the request lifecycle
pub trait JobQueue: Send + Sync {
    /// Handle for a delayed, not yet runnable job
    type Ticket: Send;

    /// Reserve room for `job`
    fn delay(&self, job: Job) -> Result<Self::Ticket, QueueError>;

    /// Make a delayed job runnable
    fn confirm(&self, ticket: Self::Ticket);

    /// Cancel a delayed job
    fn revoke(&self, ticket: Self::Ticket);
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Nothing is consuming the queue any more
    #[error("job queue unavailable")]
    Unavailable,

    #[error("job queue full")]
    Full,
}

impl QueueError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, QueueError::Unavailable)
    }
}

/// A job as seen by the workers
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: Uuid,
    pub job: Job,
    pub enqueued_at: DateTime<Utc>,
}

/// Reservation returned by [`TaskQueue::delay`]
pub struct Ticket {
    id: Uuid,
    job: Job,
    permit: OwnedPermit<QueuedJob>,
}

impl Ticket {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn job(&self) -> &Job {
        &self.job
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<QueuedJob>,
}

impl TaskQueue {
    /// Create a queue holding at most `capacity` delayed or pending jobs
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<QueuedJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl JobQueue for TaskQueue {
    type Ticket = Ticket;

    fn delay(&self, job: Job) -> Result<Ticket, QueueError> {
        let permit = self.tx.clone().try_reserve_owned().map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Closed(_) => QueueError::Unavailable,
        })?;

        let id = Uuid::new_v4();
        debug!(job_id = %id, kind = job.kind(), "Job delayed");

        Ok(Ticket { id, job, permit })
    }

    fn confirm(&self, ticket: Ticket) {
        let Ticket { id, job, permit } = ticket;
        debug!(job_id = %id, kind = job.kind(), "Job confirmed");

        permit.send(QueuedJob {
            id,
            job,
            enqueued_at: Utc::now(),
        });
    }

    fn revoke(&self, ticket: Ticket) {
        debug!(job_id = %ticket.id, kind = ticket.job.kind(), "Job revoked");
        // Dropping the permit releases the reserved slot
        drop(ticket);
    }
}
