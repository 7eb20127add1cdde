//! Background jobs
//!
//! Handlers never talk to the queue directly: they record jobs on their
//! [`RequestScope`](crate::lifecycle::RequestScope), and the request
//! lifecycle delays, confirms or revokes them depending on how the request's
//! transaction ends.

pub mod queue;
pub mod worker;

pub use queue::{JobQueue, QueueError, QueuedJob, TaskQueue, Ticket};
pub use worker::{run_job, WorkerContext, WorkerPool};

use serde::{Deserialize, Serialize};

/// Work done outside the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    /// Inspect a stored blob and record its content type and size
    ProcessImage { image_id: i64, filename: String },
    /// Add a filename to each tag's document
    IndexTags { filename: String, tags: Vec<String> },
    /// Remove a filename from one tag's document
    UnindexTag { filename: String, tag: String },
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::ProcessImage { .. } => "process_image",
            Job::IndexTags { .. } => "index_tags",
            Job::UnindexTag { .. } => "unindex_tag",
        }
    }
}
