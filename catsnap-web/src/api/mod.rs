//! HTTP API handlers for catsnap

pub mod add;
pub mod albums;
pub mod find;
pub mod health;
pub mod images;
pub mod tags;

pub use add::add_routes;
pub use albums::album_routes;
pub use find::find_routes;
pub use health::health_routes;
pub use images::image_routes;
pub use tags::tag_routes;

use axum::Router;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Every catsnap route, without the request lifecycle layers
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health_routes())
        .merge(find_routes())
        .merge(image_routes())
        .merge(add_routes())
        .merge(album_routes())
        .merge(tag_routes())
}

/// Page URL of an image
pub fn image_url(image_id: i64) -> String {
    format!("/image/{}", image_id)
}

/// Parse an id captured from a path (format suffix already stripped)
pub fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid id: {}", raw)))
}

/// Split a space-separated tag list, dropping empty entries and duplicates
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split_whitespace() {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// A single tag: non-empty, no whitespace
pub fn validate_tag(raw: &str) -> ApiResult<String> {
    let tag = raw.trim();
    if tag.is_empty() {
        return Err(ApiError::BadRequest("Tag must not be empty".to_string()));
    }
    if tag.chars().any(char::is_whitespace) {
        return Err(ApiError::BadRequest(format!("Tag must be a single word: {}", tag)));
    }
    Ok(tag.to_string())
}
