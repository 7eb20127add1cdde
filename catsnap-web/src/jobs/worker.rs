//! Job workers
//!
//! A single dispatcher drains the queue and runs up to `concurrency` jobs at
//! a time. Job failures are logged and dropped; they never reach a request.

use catsnap_common::db::images;
use catsnap_common::document::{DocumentStore, TagDocument};
use catsnap_common::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{Job, QueuedJob};
use crate::storage::BlobStore;

/// What jobs need to do their work
#[derive(Clone)]
pub struct WorkerContext {
    pub db: SqlitePool,
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    /// Tag documents are read-modify-write; one writer at a time
    document_lock: Arc<Mutex<()>>,
}

impl WorkerContext {
    pub fn new(db: SqlitePool, documents: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            db,
            documents,
            blobs,
            document_lock: Arc::new(Mutex::new(())),
        }
    }
}

pub struct WorkerPool;

impl WorkerPool {
    /// Start the dispatcher. It stops when `shutdown` is cancelled or every
    /// queue handle is dropped, then waits for running jobs.
    pub fn spawn(
        ctx: WorkerContext,
        mut rx: mpsc::Receiver<QueuedJob>,
        concurrency: usize,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let concurrency = concurrency.max(1);

        tokio::spawn(async move {
            let limit = Arc::new(Semaphore::new(concurrency));
            info!(concurrency, "Job workers started");

            loop {
                let queued = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(queued) => queued,
                        None => break,
                    },
                };

                let permit = match limit.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                let ctx = ctx.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    run_queued(&ctx, queued).await;
                });
            }

            // Every permit back means every running job has finished
            let _ = limit.acquire_many(concurrency as u32).await;
            info!("Job workers stopped");
        })
    }
}

async fn run_queued(ctx: &WorkerContext, queued: QueuedJob) {
    let QueuedJob { id, job, enqueued_at } = queued;
    let started = Instant::now();
    let waited_ms = (Utc::now() - enqueued_at).num_milliseconds();

    match run_job(ctx, &job).await {
        Ok(()) => info!(
            job_id = %id,
            kind = job.kind(),
            waited_ms,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Job finished"
        ),
        Err(e) => error!(
            job_id = %id,
            kind = job.kind(),
            error = %e,
            "Job failed"
        ),
    }
}

/// Execute one job
pub async fn run_job(ctx: &WorkerContext, job: &Job) -> Result<()> {
    match job {
        Job::ProcessImage { image_id, filename } => process_image(ctx, *image_id, filename).await,
        Job::IndexTags { filename, tags } => {
            let _guard = ctx.document_lock.lock().await;
            for tag in tags {
                TagDocument::new(tag.clone(), ctx.documents.clone())
                    .add_file(filename)
                    .await?;
            }
            Ok(())
        }
        Job::UnindexTag { filename, tag } => {
            let _guard = ctx.document_lock.lock().await;
            TagDocument::new(tag.clone(), ctx.documents.clone())
                .remove_file(filename)
                .await
        }
    }
}

async fn process_image(ctx: &WorkerContext, image_id: i64, filename: &str) -> Result<()> {
    let bytes = ctx.blobs.read(filename).await?;
    let content_type = infer::get(&bytes).map(|kind| kind.mime_type());

    let mut conn = ctx.db.acquire().await?;
    let updated = images::mark_processed(
        &mut conn,
        image_id,
        content_type,
        bytes.len() as i64,
        Utc::now(),
    )
    .await?;

    if !updated {
        warn!(image_id, filename, "Processed image no longer exists");
    }

    Ok(())
}
