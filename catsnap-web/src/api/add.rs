//! Adding images by upload or URL

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::post,
    Extension, Json, Router,
};
use catsnap_common::db::{albums, images, tags, NewImage};
use serde::Serialize;
use tracing::info;

use super::{image_url, parse_tags};
use crate::error::{abort, Abort, ApiError, ApiResult, InFormat};
use crate::fetch::MAX_IMAGE_BYTES;
use crate::format::{formatted_route, RequestFormat};
use crate::jobs::Job;
use crate::lifecycle::RequestScope;
use crate::{views, AppState};

#[derive(Debug, Default)]
struct AddForm {
    file: Option<Vec<u8>>,
    url: Option<String>,
    tags: Vec<String>,
    title: Option<String>,
    description: Option<String>,
    album_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AddResponse {
    pub image_id: i64,
    pub filename: String,
    pub url: String,
    pub source_url: String,
    pub tags: Vec<String>,
}

fn bad_multipart(e: impl std::fmt::Display) -> ApiError {
    ApiError::BadRequest(format!("Malformed form: {}", e))
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

async fn read_form(mut multipart: Multipart) -> ApiResult<AddForm> {
    let mut form = AddForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                // Browsers send an empty part when no file was chosen
                if !bytes.is_empty() {
                    form.file = Some(bytes.to_vec());
                }
            }
            "url" => form.url = non_empty(field.text().await.map_err(bad_multipart)?),
            "tags" => form.tags = parse_tags(&field.text().await.map_err(bad_multipart)?),
            "title" => form.title = non_empty(field.text().await.map_err(bad_multipart)?),
            "description" => {
                form.description = non_empty(field.text().await.map_err(bad_multipart)?)
            }
            "album_id" => {
                if let Some(raw) = non_empty(field.text().await.map_err(bad_multipart)?) {
                    let album_id = raw
                        .parse()
                        .map_err(|_| ApiError::BadRequest(format!("Invalid album_id: {}", raw)))?;
                    form.album_id = Some(album_id);
                }
            }
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

/// POST /add[.json]
///
/// Downloads (for `url`) and stores the blob before asking for the
/// request transaction, then records the image and its tags. Processing and
/// tag indexing run after commit.
pub async fn add(
    State(state): State<AppState>,
    format: RequestFormat,
    Extension(scope): Extension<RequestScope>,
    multipart: Multipart,
) -> Result<Response, Abort> {
    let form = read_form(multipart).await.in_format(format)?;

    let (bytes, origin_url) = match (form.file, form.url) {
        (Some(bytes), None) => (bytes, None),
        (None, Some(url)) => (state.fetcher.fetch(&url).await.in_format(format)?, Some(url)),
        _ => {
            return Err(abort(
                format,
                StatusCode::BAD_REQUEST,
                "Provide exactly one of file or url",
            ))
        }
    };

    // Content-addressed, so a rolled back request leaves at worst an
    // unreferenced blob that the next identical upload reuses
    let filename = state.blobs.save(&bytes).await.in_format(format)?;

    let (image, image_tags) = {
        let mut conn = scope.connection().await.in_format(format)?;

        if let Some(album_id) = form.album_id {
            let album = albums::find_album(&mut conn, album_id).await.in_format(format)?;
            if album.is_none() {
                return Err(abort(
                    format,
                    StatusCode::BAD_REQUEST,
                    format!("No such album: {}", album_id),
                ));
            }
        }

        let new_image = NewImage {
            filename: filename.clone(),
            origin_url,
            title: form.title,
            description: form.description,
            album_id: form.album_id,
        };
        let image = images::insert_image(&mut conn, &new_image)
            .await
            .in_format(format)?;

        for tag in &form.tags {
            tags::add_tag(&mut conn, image.image_id, tag)
                .await
                .in_format(format)?;
        }
        let image_tags = tags::image_tags(&mut conn, image.image_id)
            .await
            .in_format(format)?;

        (image, image_tags)
    };

    scope.delay(Job::ProcessImage {
        image_id: image.image_id,
        filename: image.filename.clone(),
    });
    if !form.tags.is_empty() {
        scope.delay(Job::IndexTags {
            filename: image.filename.clone(),
            tags: form.tags,
        });
    }

    info!(image_id = image.image_id, filename = %image.filename, bytes = bytes.len(), "Image added");

    let url = image_url(image.image_id);
    let source_url = state.blobs.url_for_filename(&image.filename);

    Ok(match format {
        RequestFormat::Html => Html(views::added_page(&url, &source_url)).into_response(),
        RequestFormat::Json => Json(AddResponse {
            image_id: image.image_id,
            filename: image.filename,
            url,
            source_url,
            tags: image_tags,
        })
        .into_response(),
    })
}

pub fn add_routes() -> Router<AppState> {
    formatted_route(
        Router::new(),
        "/add",
        post(add).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024)),
    )
}
