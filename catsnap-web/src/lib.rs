//! catsnap-web library - tagged image service
//!
//! Handlers run inside a per-request transaction (see [`lifecycle`]); work
//! that should happen after the response goes through the job queue.

use axum::{middleware, Router};
use catsnap_common::document::DocumentStore;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod error;
pub mod fetch;
pub mod format;
pub mod jobs;
pub mod lifecycle;
pub mod storage;
pub mod views;

pub use error::{ApiError, ApiResult};

use fetch::ImageFetcher;
use jobs::TaskQueue;
use storage::BlobStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Where committed requests send their jobs
    pub queue: TaskQueue,
    /// Tag documents
    pub documents: Arc<dyn DocumentStore>,
    /// Image bytes
    pub blobs: Arc<dyn BlobStore>,
    /// Served under /public
    pub images_dir: PathBuf,
    /// Downloads images added by URL
    pub fetcher: ImageFetcher,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        queue: TaskQueue,
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        images_dir: PathBuf,
        fetcher: ImageFetcher,
    ) -> Self {
        Self {
            db,
            queue,
            documents,
            blobs,
            images_dir,
            fetcher,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    finish_router(api::routes(), state)
}

/// Add static files and the request lifecycle to `routes`
///
/// Layer order, outermost first: tracing, transaction, panic catcher. A
/// panicking handler becomes a 500 before the transaction layer sees it, so
/// it rolls back like any other failure.
pub fn finish_router(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .nest_service("/public", ServeDir::new(&state.images_dir))
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            lifecycle::transactional,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
