//! Downloading images added by URL

use std::time::Duration;

use crate::error::{ApiError, ApiResult};

/// Largest accepted image, uploaded or fetched
pub const MAX_IMAGE_BYTES: usize = 25 * 1024 * 1024;

/// Whole-request deadline for a URL fetch, body included
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("catsnap/", env!("CARGO_PKG_VERSION"));

/// HTTP client for adding images by URL
///
/// Downloads are bounded in time and size: a declared `Content-Length` over
/// the limit is rejected before the body is read, and reading stops as soon
/// as the received bytes pass it.
#[derive(Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new() -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, MAX_IMAGE_BYTES))
    }

    pub fn with_client(client: reqwest::Client, max_bytes: usize) -> Self {
        Self { client, max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn fetch(&self, url: &str) -> ApiResult<Vec<u8>> {
        let fetch_error =
            |e: reqwest::Error| ApiError::BadRequest(format!("Could not fetch {}: {}", url, e));
        let too_large = || {
            ApiError::BadRequest(format!(
                "Image at {} is larger than {} bytes",
                url, self.max_bytes
            ))
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(fetch_error)?
            .error_for_status()
            .map_err(fetch_error)?;

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(too_large());
            }
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(fetch_error)? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }

        tracing::debug!(url, bytes = bytes.len(), "Fetched image");
        Ok(bytes)
    }
}
