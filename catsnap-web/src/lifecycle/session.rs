//! Database side of the request lifecycle

use async_trait::async_trait;
use axum::http::Method;
use sqlx::error::ErrorKind;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A constraint was violated; the transaction can still be rolled back
    #[error("integrity error: {0}")]
    Integrity(String),

    /// The connection is gone; there is nothing to roll back on
    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Other(String),
}

impl SessionError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SessionError::Unavailable(_))
    }
}

impl From<sqlx::Error> for SessionError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => SessionError::Integrity(err.to_string()),
                _ => SessionError::Other(err.to_string()),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => SessionError::Unavailable(err.to_string()),
            _ => SessionError::Other(err.to_string()),
        }
    }
}

/// One request's unit of work
///
/// `commit` and `rollback` consume the session, so at most one of them runs.
#[async_trait]
pub trait Session: Send + Sized {
    /// Surface pending constraint violations before committing
    async fn flush(&mut self) -> Result<(), SessionError>;

    async fn commit(self) -> Result<(), SessionError>;

    async fn rollback(self) -> Result<(), SessionError>;
}

/// A request that never touched the database has nothing to settle
#[async_trait]
impl<S: Session> Session for Option<S> {
    async fn flush(&mut self) -> Result<(), SessionError> {
        match self {
            Some(session) => session.flush().await,
            None => Ok(()),
        }
    }

    async fn commit(self) -> Result<(), SessionError> {
        match self {
            Some(session) => session.commit().await,
            None => Ok(()),
        }
    }

    async fn rollback(self) -> Result<(), SessionError> {
        match self {
            Some(session) => session.rollback().await,
            None => Ok(()),
        }
    }
}

/// How the transaction takes its locks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginMode {
    /// Plain `BEGIN`; for requests that only read
    Deferred,
    /// `BEGIN IMMEDIATE`: takes the write lock up front, waiting out the busy
    /// timeout. A deferred transaction that reads and then writes fails with
    /// SQLITE_BUSY at once if another writer committed in between.
    Immediate,
}

impl BeginMode {
    /// Immediate for anything but GET, HEAD and OPTIONS
    pub fn for_method(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
            BeginMode::Deferred
        } else {
            BeginMode::Immediate
        }
    }
}

/// [`Session`] over a sqlx SQLite transaction
///
/// Foreign key checks are deferred to commit so a request can insert rows in
/// any order; `flush` runs the check early.
pub struct SqlxSession {
    tx: Transaction<'static, Sqlite>,
}

impl SqlxSession {
    pub async fn begin(pool: &SqlitePool, mode: BeginMode) -> Result<Self, SessionError> {
        let mut tx = match mode {
            BeginMode::Deferred => pool.begin().await?,
            BeginMode::Immediate => pool.begin_with("BEGIN IMMEDIATE").await?,
        };
        sqlx::query("PRAGMA defer_foreign_keys = ON")
            .execute(&mut *tx)
            .await?;
        Ok(Self { tx })
    }

    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }
}

#[async_trait]
impl Session for SqlxSession {
    async fn flush(&mut self) -> Result<(), SessionError> {
        let violations = sqlx::query("PRAGMA foreign_key_check")
            .fetch_all(&mut *self.tx)
            .await?;

        match violations.first() {
            None => Ok(()),
            Some(first) => {
                let table: String = first.try_get(0).unwrap_or_default();
                Err(SessionError::Integrity(format!(
                    "{} foreign key violation(s), first in table {}",
                    violations.len(),
                    table
                )))
            }
        }
    }

    async fn commit(self) -> Result<(), SessionError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), SessionError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catsnap_common::db::init_database;

    async fn pool(temp: &tempfile::TempDir) -> SqlitePool {
        init_database(&temp.path().join("catsnap.db")).await.unwrap()
    }

    async fn album_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM albums")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_and_rollback() {
        let temp = tempfile::tempdir().unwrap();
        let pool = pool(&temp).await;

        let mut session = SqlxSession::begin(&pool, BeginMode::Deferred).await.unwrap();
        sqlx::query("INSERT INTO albums (name) VALUES ('kept')")
            .execute(session.connection())
            .await
            .unwrap();
        session.flush().await.unwrap();
        session.commit().await.unwrap();

        let mut session = SqlxSession::begin(&pool, BeginMode::Deferred).await.unwrap();
        sqlx::query("INSERT INTO albums (name) VALUES ('dropped')")
            .execute(session.connection())
            .await
            .unwrap();
        session.rollback().await.unwrap();

        assert_eq!(album_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_flush_reports_deferred_foreign_key_violation() {
        let temp = tempfile::tempdir().unwrap();
        let pool = pool(&temp).await;

        let mut session = SqlxSession::begin(&pool, BeginMode::Deferred).await.unwrap();
        sqlx::query("INSERT INTO images (filename, album_id) VALUES ('x', 42)")
            .execute(session.connection())
            .await
            .expect("foreign key checks are deferred inside a session");

        let err = session.flush().await.unwrap_err();
        assert!(matches!(err, SessionError::Integrity(_)), "got {:?}", err);

        session.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_with_violation_is_integrity_error() {
        let temp = tempfile::tempdir().unwrap();
        let pool = pool(&temp).await;

        let mut session = SqlxSession::begin(&pool, BeginMode::Deferred).await.unwrap();
        sqlx::query("INSERT INTO images (filename, album_id) VALUES ('x', 42)")
            .execute(session.connection())
            .await
            .unwrap();

        let err = session.commit().await.unwrap_err();
        assert!(matches!(err, SessionError::Integrity(_)), "got {:?}", err);

        let images: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(images, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_immediate_sessions_wait_for_each_other() {
        let temp = tempfile::tempdir().unwrap();
        let pool = pool(&temp).await;

        let mut first = SqlxSession::begin(&pool, BeginMode::Immediate).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM albums")
            .fetch_one(first.connection())
            .await
            .unwrap();
        assert_eq!(count, 0);

        // Read then write, the pattern that fails under plain BEGIN
        let second_pool = pool.clone();
        let second = tokio::spawn(async move {
            let mut session = SqlxSession::begin(&second_pool, BeginMode::Immediate).await?;
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM albums")
                .fetch_one(session.connection())
                .await?;
            sqlx::query("INSERT INTO albums (name) VALUES ('second')")
                .execute(session.connection())
                .await?;
            session.commit().await
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        sqlx::query("INSERT INTO albums (name) VALUES ('first')")
            .execute(first.connection())
            .await
            .unwrap();
        first.commit().await.unwrap();

        second.await.unwrap().unwrap();
        assert_eq!(album_count(&pool).await, 2);
    }

    #[test]
    fn test_begin_mode_for_method() {
        assert_eq!(BeginMode::for_method(&Method::GET), BeginMode::Deferred);
        assert_eq!(BeginMode::for_method(&Method::HEAD), BeginMode::Deferred);
        assert_eq!(BeginMode::for_method(&Method::POST), BeginMode::Immediate);
        assert_eq!(BeginMode::for_method(&Method::PATCH), BeginMode::Immediate);
        assert_eq!(BeginMode::for_method(&Method::DELETE), BeginMode::Immediate);
    }

    #[tokio::test]
    async fn test_unopened_session_settles_as_no_op() {
        let mut session: Option<SqlxSession> = None;
        session.flush().await.unwrap();
        session.commit().await.unwrap();
        None::<SqlxSession>.rollback().await.unwrap();
    }

    #[test]
    fn test_pool_errors_are_unavailable() {
        assert!(SessionError::from(sqlx::Error::PoolClosed).is_unavailable());
        assert!(SessionError::from(sqlx::Error::PoolTimedOut).is_unavailable());
        assert!(!SessionError::from(sqlx::Error::RowNotFound).is_unavailable());
    }
}
