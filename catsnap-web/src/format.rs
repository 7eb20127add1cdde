//! Response formats
//!
//! Formatted routes answer in HTML, or in JSON when the path ends in `.json`
//! (`/find.json`, `/image/12.json`).

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::MethodRouter;
use axum::Router;
use serde::Serialize;
use std::convert::Infallible;

use crate::AppState;

const JSON_SUFFIX: &str = ".json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestFormat {
    Html,
    Json,
}

impl RequestFormat {
    pub fn from_path(path: &str) -> Self {
        if path.ends_with(JSON_SUFFIX) {
            RequestFormat::Json
        } else {
            RequestFormat::Html
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestFormat
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestFormat::from_path(parts.uri.path()))
    }
}

/// Strip the format suffix from a captured path segment (`"12.json"` → `"12"`)
pub fn strip_format(segment: &str) -> &str {
    segment.strip_suffix(JSON_SUFFIX).unwrap_or(segment)
}

/// Register `path` and `path.json` with the same handlers
///
/// For paths ending in a capture, register the plain path only and use
/// [`strip_format`] on the captured value.
pub fn formatted_route(
    router: Router<AppState>,
    path: &str,
    method_router: MethodRouter<AppState>,
) -> Router<AppState> {
    router
        .route(path, method_router.clone())
        .route(&format!("{}{}", path, JSON_SUFFIX), method_router)
}
