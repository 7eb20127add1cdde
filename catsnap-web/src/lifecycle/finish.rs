//! Request teardown: settle the session and the jobs it delayed

use axum::http::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use super::session::{Session, SessionError};
use crate::jobs::{Job, JobQueue, QueueError};

/// How the handler's response ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

impl Outcome {
    /// Only 2xx responses commit
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_success() {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("flush failed: {0}")]
    Flush(SessionError),

    #[error("could not enqueue job: {0}")]
    Enqueue(QueueError),

    #[error("commit failed: {0}")]
    Commit(SessionError),

    #[error("rollback failed: {0}")]
    Rollback(SessionError),
}

/// Commit or roll back `session`, and confirm or cancel `jobs` to match
///
/// - failed response: roll back, `jobs` are never sent
/// - flush error: roll back, unless the database is unavailable
/// - enqueue error: revoke what was already delayed (unless the queue is
///   unavailable), then roll back
/// - commit error: revoke every delayed job
/// - otherwise: commit, then confirm every delayed job
pub async fn finish_request<S, Q>(
    mut session: S,
    queue: &Q,
    jobs: Vec<Job>,
    outcome: Outcome,
) -> Result<(), LifecycleError>
where
    S: Session,
    Q: JobQueue,
{
    if outcome == Outcome::Failed {
        if !jobs.is_empty() {
            debug!(discarded = jobs.len(), "Unsuccessful response, dropping delayed jobs");
        }
        return session.rollback().await.map_err(LifecycleError::Rollback);
    }

    if let Err(e) = session.flush().await {
        if !e.is_unavailable() {
            rollback_after_error(session).await;
        }
        return Err(LifecycleError::Flush(e));
    }

    let mut tickets = Vec::with_capacity(jobs.len());
    for job in jobs {
        match queue.delay(job) {
            Ok(ticket) => tickets.push(ticket),
            Err(e) => {
                if e.is_unavailable() {
                    warn!(delayed = tickets.len(), "Job queue unavailable, not revoking delayed jobs");
                } else {
                    for ticket in tickets {
                        queue.revoke(ticket);
                    }
                }
                rollback_after_error(session).await;
                return Err(LifecycleError::Enqueue(e));
            }
        }
    }

    if let Err(e) = session.commit().await {
        for ticket in tickets {
            queue.revoke(ticket);
        }
        return Err(LifecycleError::Commit(e));
    }

    for ticket in tickets {
        queue.confirm(ticket);
    }

    Ok(())
}

/// The caller already has an error to report; a failed rollback is only logged
async fn rollback_after_error<S: Session>(session: S) {
    if let Err(e) = session.rollback().await {
        warn!(error = %e, "Rollback after failed request teardown also failed");
    }
}
