//! Tag search

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use catsnap_common::db::tags;
use serde::{Deserialize, Serialize};

use super::{image_url, parse_tags};
use crate::error::{abort, Abort, InFormat};
use crate::format::{formatted_route, RequestFormat};
use crate::lifecycle::RequestScope;
use crate::{views, AppState};

#[derive(Debug, Deserialize)]
pub struct FindQuery {
    /// Space-separated tag names
    #[serde(default)]
    pub tags: Option<String>,
}

/// One search hit
#[derive(Debug, Clone, Serialize)]
pub struct FoundImage {
    /// Where the image bytes are served from
    pub source_url: String,
    /// The image's page
    pub url: String,
    pub tags: Vec<String>,
}

/// GET /find?tags=cat%20funny
///
/// Images carrying any of the given tags.
pub async fn find(
    State(state): State<AppState>,
    format: RequestFormat,
    Extension(scope): Extension<RequestScope>,
    Query(query): Query<FindQuery>,
) -> Result<Response, Abort> {
    let tag_names = parse_tags(query.tags.as_deref().unwrap_or_default());
    if tag_names.is_empty() {
        return Err(abort(format, StatusCode::BAD_REQUEST, "No tags given"));
    }

    let image_data = {
        let mut conn = scope.connection().await.in_format(format)?;
        tags::get_image_data(&mut conn, &tag_names)
            .await
            .in_format(format)?
    };

    let images: Vec<FoundImage> = image_data
        .into_iter()
        .map(|data| FoundImage {
            source_url: state.blobs.url_for_filename(&data.filename),
            url: image_url(data.image_id),
            tags: data.tags,
        })
        .collect();

    tracing::debug!(tags = ?tag_names, found = images.len(), "Tag search");

    Ok(match format {
        RequestFormat::Html => Html(views::find_page(&tag_names, &images)).into_response(),
        RequestFormat::Json => Json(images).into_response(),
    })
}

pub fn find_routes() -> Router<AppState> {
    formatted_route(Router::new(), "/find", get(find))
}
