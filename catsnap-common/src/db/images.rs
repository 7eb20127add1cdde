//! Image queries

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::models::{Image, ImageChanges, NewImage};
use crate::Result;

const IMAGE_COLUMNS: &str = "image_id, filename, origin_url, title, description, album_id, \
                             content_type, byte_size, processed_at, created_at";

/// Insert an image row, or return the existing one for the same blob
///
/// Blob filenames are content hashes, so uploading identical bytes twice
/// refers to the same image.
pub async fn insert_image(conn: &mut SqliteConnection, new: &NewImage) -> Result<Image> {
    if let Some(existing) = find_image_by_filename(conn, &new.filename).await? {
        return Ok(existing);
    }

    let sql = format!(
        "INSERT INTO images (filename, origin_url, title, description, album_id) \
         VALUES (?, ?, ?, ?, ?) RETURNING {}",
        IMAGE_COLUMNS
    );

    let image = sqlx::query_as::<_, Image>(&sql)
        .bind(&new.filename)
        .bind(&new.origin_url)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.album_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(image)
}

pub async fn find_image(conn: &mut SqliteConnection, image_id: i64) -> Result<Option<Image>> {
    let sql = format!("SELECT {} FROM images WHERE image_id = ?", IMAGE_COLUMNS);
    let image = sqlx::query_as::<_, Image>(&sql)
        .bind(image_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(image)
}

pub async fn find_image_by_filename(
    conn: &mut SqliteConnection,
    filename: &str,
) -> Result<Option<Image>> {
    let sql = format!("SELECT {} FROM images WHERE filename = ?", IMAGE_COLUMNS);
    let image = sqlx::query_as::<_, Image>(&sql)
        .bind(filename)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(image)
}

/// Apply the fields present in `changes`; absent fields keep their value
pub async fn update_image(
    conn: &mut SqliteConnection,
    image_id: i64,
    changes: &ImageChanges,
) -> Result<Option<Image>> {
    sqlx::query(
        r#"
        UPDATE images SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            album_id = COALESCE(?, album_id)
        WHERE image_id = ?
        "#,
    )
    .bind(&changes.title)
    .bind(&changes.description)
    .bind(changes.album_id)
    .bind(image_id)
    .execute(&mut *conn)
    .await?;

    find_image(conn, image_id).await
}

/// Record what the processing job learned about the blob
pub async fn mark_processed(
    conn: &mut SqliteConnection,
    image_id: i64,
    content_type: Option<&str>,
    byte_size: i64,
    processed_at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE images SET content_type = ?, byte_size = ?, processed_at = ? WHERE image_id = ?",
    )
    .bind(content_type)
    .bind(byte_size)
    .bind(processed_at)
    .bind(image_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_album_images(conn: &mut SqliteConnection, album_id: i64) -> Result<Vec<Image>> {
    let sql = format!(
        "SELECT {} FROM images WHERE album_id = ? ORDER BY image_id ASC",
        IMAGE_COLUMNS
    );
    let images = sqlx::query_as::<_, Image>(&sql)
        .bind(album_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(images)
}
