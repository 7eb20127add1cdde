//! Tag listings

use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use catsnap_common::db::tags;
use catsnap_common::document::TagDocument;
use serde::Serialize;

use super::validate_tag;
use crate::error::ApiResult;
use crate::lifecycle::RequestScope;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TagFiles {
    pub tag: String,
    pub filenames: Vec<String>,
}

/// GET /tag/:name
///
/// Reads the tag's document, which the index jobs maintain, so images added
/// moments ago may not be listed yet.
pub async fn tag_files(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<TagFiles>> {
    let tag = validate_tag(&name)?;
    let filenames = TagDocument::new(tag.clone(), state.documents.clone())
        .get_filenames()
        .await?;

    Ok(Json(TagFiles { tag, filenames }))
}

/// GET /tags
pub async fn list_tags(Extension(scope): Extension<RequestScope>) -> ApiResult<Json<Vec<String>>> {
    let mut conn = scope.connection().await?;
    Ok(Json(tags::list_tag_names(&mut conn).await?))
}

pub fn tag_routes() -> Router<AppState> {
    Router::new()
        .route("/tag/:name", get(tag_files))
        .route("/tags", get(list_tags))
}
