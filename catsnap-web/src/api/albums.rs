//! Albums

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use catsnap_common::db::{albums, images, Album};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::error::ErrorKind;

use super::{image_url, parse_id};
use crate::error::{Abort, ApiError, ApiResult, InFormat};
use crate::format::{strip_format, RequestFormat};
use crate::lifecycle::RequestScope;
use crate::{views, AppState};

#[derive(Debug, Deserialize)]
pub struct NewAlbumRequest {
    #[serde(default)]
    pub name: Option<String>,
}

/// An album with its images, oldest first
#[derive(Debug, Clone, Serialize)]
pub struct AlbumView {
    pub album_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub images: Vec<AlbumImage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlbumImage {
    pub image_id: i64,
    pub title: Option<String>,
    pub source_url: String,
    pub url: String,
}

/// GET /albums
pub async fn list_albums(
    Extension(scope): Extension<RequestScope>,
) -> ApiResult<Json<Vec<Album>>> {
    let mut conn = scope.connection().await?;
    Ok(Json(albums::list_albums(&mut conn).await?))
}

/// POST /new_album
pub async fn new_album(
    Extension(scope): Extension<RequestScope>,
    Json(request): Json<NewAlbumRequest>,
) -> ApiResult<(StatusCode, Json<Album>)> {
    let name = request
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Album name is required".to_string()))?;

    let mut conn = scope.connection().await?;
    if albums::find_album_by_name(&mut conn, &name).await?.is_some() {
        return Err(ApiError::Conflict(format!("Album already exists: {}", name)));
    }

    let album = albums::insert_album(&mut conn, &name)
        .await
        .map_err(|e| conflict_on_duplicate(e, &name))?;
    tracing::info!(album_id = album.album_id, name = %album.name, "Album created");

    Ok((StatusCode::CREATED, Json(album)))
}

/// The name check and the insert can still be raced; the UNIQUE index has
/// the last word
fn conflict_on_duplicate(err: catsnap_common::Error, name: &str) -> ApiError {
    match &err {
        catsnap_common::Error::Database(sqlx::Error::Database(db_err))
            if matches!(db_err.kind(), ErrorKind::UniqueViolation) =>
        {
            ApiError::Conflict(format!("Album already exists: {}", name))
        }
        _ => err.into(),
    }
}

/// GET /album/:id[.json]
pub async fn show_album(
    State(state): State<AppState>,
    format: RequestFormat,
    Extension(scope): Extension<RequestScope>,
    Path(segment): Path<String>,
) -> Result<Response, Abort> {
    let album_id = parse_id(strip_format(&segment)).in_format(format)?;

    let (album, album_images) = {
        let mut conn = scope.connection().await.in_format(format)?;
        let album = albums::find_album(&mut conn, album_id)
            .await
            .in_format(format)?
            .ok_or_else(|| ApiError::NotFound(format!("Album {}", album_id)))
            .in_format(format)?;
        let album_images = images::list_album_images(&mut conn, album_id)
            .await
            .in_format(format)?;
        (album, album_images)
    };

    let view = AlbumView {
        album_id: album.album_id,
        name: album.name,
        created_at: album.created_at,
        images: album_images
            .into_iter()
            .map(|image| AlbumImage {
                image_id: image.image_id,
                url: image_url(image.image_id),
                source_url: state.blobs.url_for_filename(&image.filename),
                title: image.title,
            })
            .collect(),
    };

    Ok(match format {
        RequestFormat::Html => Html(views::album_page(&view)).into_response(),
        RequestFormat::Json => Json(view).into_response(),
    })
}

pub fn album_routes() -> Router<AppState> {
    Router::new()
        .route("/albums", get(list_albums))
        .route("/new_album", post(new_album))
        .route("/album/:id", get(show_album))
}
