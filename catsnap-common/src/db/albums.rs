//! Album queries

use sqlx::SqliteConnection;

use super::models::Album;
use crate::Result;

pub async fn insert_album(conn: &mut SqliteConnection, name: &str) -> Result<Album> {
    let album = sqlx::query_as::<_, Album>(
        "INSERT INTO albums (name) VALUES (?) RETURNING album_id, name, created_at",
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;

    Ok(album)
}

pub async fn find_album(conn: &mut SqliteConnection, album_id: i64) -> Result<Option<Album>> {
    let album = sqlx::query_as::<_, Album>(
        "SELECT album_id, name, created_at FROM albums WHERE album_id = ?",
    )
    .bind(album_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(album)
}

pub async fn find_album_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<Album>> {
    let album = sqlx::query_as::<_, Album>(
        "SELECT album_id, name, created_at FROM albums WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(album)
}

pub async fn list_albums(conn: &mut SqliteConnection) -> Result<Vec<Album>> {
    let albums = sqlx::query_as::<_, Album>(
        "SELECT album_id, name, created_at FROM albums ORDER BY name ASC",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(albums)
}
