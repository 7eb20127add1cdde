//! Shared helpers for catsnap-web integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use catsnap_common::config::RootFolderInitializer;
use catsnap_common::db::init_database;
use catsnap_common::document::{DocumentStore, SqliteDocumentStore};
use catsnap_web::fetch::ImageFetcher;
use catsnap_web::jobs::{Job, QueuedJob, TaskQueue, WorkerContext};
use catsnap_web::storage::{BlobStore, FilesystemBlobStore};
use catsnap_web::{build_router, AppState};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::util::ServiceExt;

/// Smallest valid GIF
pub const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";

const BOUNDARY: &str = "catsnap-test-boundary";

pub struct TestApp {
    /// Root folder; removed on drop
    pub temp: TempDir,
    pub state: AppState,
    /// Receiving end of the job queue, standing in for the workers
    pub jobs: mpsc::Receiver<QueuedJob>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_queue_capacity(64).await
    }

    pub async fn with_queue_capacity(capacity: usize) -> Self {
        let fetcher = ImageFetcher::new().expect("Failed to build HTTP client");
        Self::build(capacity, fetcher).await
    }

    /// URL fetches refuse bodies over `max_bytes`
    pub async fn with_fetch_limit(max_bytes: usize) -> Self {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        Self::build(64, ImageFetcher::with_client(client, max_bytes)).await
    }

    async fn build(capacity: usize, fetcher: ImageFetcher) -> Self {
        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let initializer = RootFolderInitializer::new(temp.path().to_path_buf());
        initializer
            .ensure_directory_exists()
            .expect("Failed to create root folder");

        let pool = init_database(&initializer.database_path())
            .await
            .expect("Failed to create database");
        let documents: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(pool.clone()));
        let blobs: Arc<dyn BlobStore> =
            Arc::new(FilesystemBlobStore::new(initializer.images_path(), "/public"));
        let (queue, jobs) = TaskQueue::new(capacity);

        let state = AppState::new(
            pool,
            queue,
            documents,
            blobs,
            initializer.images_path(),
            fetcher,
        );

        Self { temp, state, jobs }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        send(self.router(), request).await
    }

    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, body) = self.send(request).await;
        let value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    /// Jobs released to the workers so far
    pub fn released_jobs(&mut self) -> Vec<Job> {
        let mut released = Vec::new();
        while let Ok(queued) = self.jobs.try_recv() {
            released.push(queued.job);
        }
        released
    }

    pub fn worker_context(&self) -> WorkerContext {
        WorkerContext::new(
            self.state.db.clone(),
            self.state.documents.clone(),
            self.state.blobs.clone(),
        )
    }

    /// Upload `bytes` with `tags`, returning the new image id
    pub async fn add_image(&self, bytes: &[u8], tags: &str) -> i64 {
        let request = multipart_request(
            "/add.json",
            &[
                Part::file("file", "cat.gif", bytes),
                Part::text("tags", tags),
            ],
        );
        let (status, body) = self.send_json(request).await;
        assert_eq!(status, StatusCode::OK, "add failed: {}", body);
        body["image_id"].as_i64().expect("image_id in add response")
    }
}

pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes()
        .to_vec();
    (status, body)
}

/// Serve `files` over HTTP on a local port; returns the base URL
pub async fn serve_files(files: Vec<(&'static str, Vec<u8>)>) -> String {
    let mut router = Router::new();
    for (path, bytes) in files {
        router = router.route(
            path,
            axum::routing::get(move || {
                let bytes = bytes.clone();
                async move { bytes }
            }),
        );
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind file server");
    let addr = listener.local_addr().expect("file server address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    format!("http://{}", addr)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn json_request(method: Method, uri: &str, value: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string()))
        .unwrap()
}

pub struct Part<'a> {
    name: &'a str,
    filename: Option<&'a str>,
    data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            filename: None,
            data: value.as_bytes(),
        }
    }

    pub fn file(name: &'a str, filename: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            filename: Some(filename),
            data,
        }
    }
}

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    part.name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name).as_bytes(),
            ),
        }
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}
