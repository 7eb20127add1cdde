//! Per-request transaction scope and the middleware that settles it

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, error};

use super::finish::{finish_request, Outcome};
use super::session::{BeginMode, SqlxSession};
use crate::error::{abort, ApiError, ApiResult};
use crate::format::RequestFormat;
use crate::jobs::Job;
use crate::AppState;

enum SessionSlot {
    /// Nothing has asked for the database yet
    Unopened,
    Open(SqlxSession),
    Settled,
}

/// Handler-side view of the request's unit of work
///
/// Inserted into request extensions by [`transactional`]; handlers take it
/// with `Extension<RequestScope>`. The transaction begins on the first call
/// to [`connection`](Self::connection), so work done before that (such as
/// downloading an image) holds neither a pooled connection nor a lock.
#[derive(Clone)]
pub struct RequestScope {
    pool: SqlitePool,
    mode: BeginMode,
    session: Arc<Mutex<SessionSlot>>,
    jobs: Arc<std::sync::Mutex<Vec<Job>>>,
}

impl RequestScope {
    fn new(pool: SqlitePool, mode: BeginMode) -> Self {
        Self {
            pool,
            mode,
            session: Arc::new(Mutex::new(SessionSlot::Unopened)),
            jobs: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    /// The request transaction's connection, beginning the transaction if
    /// needed
    ///
    /// Hold the guard only as long as needed; it serialises access to the
    /// transaction.
    pub async fn connection(&self) -> ApiResult<MappedMutexGuard<'_, SqliteConnection>> {
        let mut guard = self.session.lock().await;
        if matches!(*guard, SessionSlot::Unopened) {
            *guard = SessionSlot::Open(SqlxSession::begin(&self.pool, self.mode).await?);
            debug!(mode = ?self.mode, "Request transaction opened");
        }

        MutexGuard::try_map(guard, |slot| match slot {
            SessionSlot::Open(session) => Some(session.connection()),
            _ => None,
        })
        .map_err(|_| ApiError::Internal("request transaction already settled".to_string()))
    }

    /// Run `job` in the background if, and only if, this request commits
    pub fn delay(&self, job: Job) {
        debug!(kind = job.kind(), "Job recorded for request teardown");
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(job);
    }

    async fn close(&self) -> (Option<SqlxSession>, Vec<Job>) {
        let slot = std::mem::replace(&mut *self.session.lock().await, SessionSlot::Settled);
        let session = match slot {
            SessionSlot::Open(session) => Some(session),
            SessionSlot::Unopened | SessionSlot::Settled => None,
        };
        let jobs = std::mem::take(
            &mut *self
                .jobs
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        (session, jobs)
    }
}

/// Wrap every request in a transaction
///
/// Writes (anything but GET, HEAD and OPTIONS) begin with `BEGIN IMMEDIATE`
/// so concurrent writers queue on the busy timeout instead of failing. The
/// handler's response decides the outcome: 2xx commits and releases the
/// delayed jobs, anything else rolls back and drops them. A failure while
/// settling replaces the response with a 500.
pub async fn transactional(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let format = RequestFormat::from_path(request.uri().path());
    let mode = BeginMode::for_method(request.method());

    let scope = RequestScope::new(state.db.clone(), mode);
    request.extensions_mut().insert(scope.clone());

    let response = next.run(request).await;
    let outcome = Outcome::from_status(response.status());

    let (session, jobs) = scope.close().await;

    match finish_request(session, &state.queue, jobs, outcome).await {
        Ok(()) => response,
        Err(e) => {
            error!(error = %e, status = %response.status(), "Request teardown failed");
            abort(format, StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
