//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Album {
    pub album_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Image {
    pub image_id: i64,
    /// Content-addressed blob name
    pub filename: String,
    /// Where the image was fetched from, when added by URL
    pub origin_url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub album_id: Option<i64>,
    /// Filled in by the background processing job
    pub content_type: Option<String>,
    pub byte_size: Option<i64>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new image row
#[derive(Debug, Clone, Default)]
pub struct NewImage {
    pub filename: String,
    pub origin_url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub album_id: Option<i64>,
}

/// Partial update of an image's editable metadata
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub album_id: Option<i64>,
}

/// One image matched by a tag search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaggedImage {
    pub filename: String,
    pub image_id: i64,
    /// Every tag on the image, not only the ones searched for
    pub tags: Vec<String>,
}
