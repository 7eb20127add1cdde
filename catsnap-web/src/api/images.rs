//! Image details, metadata edits and tagging

use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use catsnap_common::db::{albums, images, tags, Album, ImageChanges};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use super::{image_url, parse_id, validate_tag};
use crate::error::{Abort, ApiError, ApiResult, InFormat};
use crate::format::{strip_format, RequestFormat};
use crate::jobs::Job;
use crate::lifecycle::RequestScope;
use crate::{views, AppState};

/// An image with its tags and album
#[derive(Debug, Clone, Serialize)]
pub struct ImageView {
    pub image_id: i64,
    pub filename: String,
    pub url: String,
    pub source_url: String,
    pub origin_url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub album: Option<Album>,
    pub tags: Vec<String>,
    pub content_type: Option<String>,
    pub byte_size: Option<i64>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

async fn load_view(
    state: &AppState,
    conn: &mut SqliteConnection,
    image_id: i64,
) -> ApiResult<ImageView> {
    let image = images::find_image(conn, image_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Image {}", image_id)))?;

    let album = match image.album_id {
        Some(album_id) => albums::find_album(conn, album_id).await?,
        None => None,
    };
    let tags = tags::image_tags(conn, image_id).await?;

    Ok(ImageView {
        image_id: image.image_id,
        url: image_url(image.image_id),
        source_url: state.blobs.url_for_filename(&image.filename),
        filename: image.filename,
        origin_url: image.origin_url,
        title: image.title,
        description: image.description,
        album,
        tags,
        content_type: image.content_type,
        byte_size: image.byte_size,
        processed_at: image.processed_at,
        created_at: image.created_at,
    })
}

/// GET /image/:id[.json]
pub async fn show_image(
    State(state): State<AppState>,
    format: RequestFormat,
    Extension(scope): Extension<RequestScope>,
    Path(segment): Path<String>,
) -> Result<Response, Abort> {
    let image_id = parse_id(strip_format(&segment)).in_format(format)?;

    let view = {
        let mut conn = scope.connection().await.in_format(format)?;
        load_view(&state, &mut conn, image_id).await.in_format(format)?
    };

    Ok(match format {
        RequestFormat::Html => Html(views::image_page(&view)).into_response(),
        RequestFormat::Json => Json(view).into_response(),
    })
}

/// PATCH /image/:id
///
/// Fields left out of the body keep their current value.
pub async fn edit_image(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(image_id): Path<i64>,
    Json(changes): Json<ImageChanges>,
) -> ApiResult<Json<ImageView>> {
    let mut conn = scope.connection().await?;

    if let Some(album_id) = changes.album_id {
        if albums::find_album(&mut conn, album_id).await?.is_none() {
            return Err(ApiError::BadRequest(format!("No such album: {}", album_id)));
        }
    }

    images::update_image(&mut conn, image_id, &changes)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Image {}", image_id)))?;

    tracing::info!(image_id, "Image metadata updated");

    Ok(Json(load_view(&state, &mut conn, image_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub tag: String,
}

#[derive(Debug, Serialize)]
pub struct TagResponse {
    pub image_id: i64,
    pub tags: Vec<String>,
}

/// POST /image/:id/tag
pub async fn add_image_tag(
    Extension(scope): Extension<RequestScope>,
    Path(image_id): Path<i64>,
    Json(request): Json<TagRequest>,
) -> ApiResult<Json<TagResponse>> {
    let tag = validate_tag(&request.tag)?;

    let (filename, added, tags) = {
        let mut conn = scope.connection().await?;
        let image = images::find_image(&mut conn, image_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Image {}", image_id)))?;
        let added = tags::add_tag(&mut conn, image_id, &tag).await?;
        let tags = tags::image_tags(&mut conn, image_id).await?;
        (image.filename, added, tags)
    };

    if added {
        scope.delay(Job::IndexTags {
            filename,
            tags: vec![tag],
        });
    }

    Ok(Json(TagResponse { image_id, tags }))
}

/// DELETE /image/:id/tag
pub async fn remove_image_tag(
    Extension(scope): Extension<RequestScope>,
    Path(image_id): Path<i64>,
    Json(request): Json<TagRequest>,
) -> ApiResult<Json<TagResponse>> {
    let tag = validate_tag(&request.tag)?;

    let (filename, removed, tags) = {
        let mut conn = scope.connection().await?;
        let image = images::find_image(&mut conn, image_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Image {}", image_id)))?;
        let removed = tags::remove_tag(&mut conn, image_id, &tag).await?;
        let tags = tags::image_tags(&mut conn, image_id).await?;
        (image.filename, removed, tags)
    };

    if !removed {
        return Err(ApiError::NotFound(format!(
            "Image {} is not tagged {}",
            image_id, tag
        )));
    }

    scope.delay(Job::UnindexTag { filename, tag });

    Ok(Json(TagResponse { image_id, tags }))
}

pub fn image_routes() -> Router<AppState> {
    // The capture takes the `.json` suffix with it; show_image strips it
    Router::new()
        .route("/image/:id", get(show_image).patch(edit_image))
        .route("/image/:id/tag", post(add_image_tag).delete(remove_image_tag))
}
