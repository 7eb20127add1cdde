//! Tag queries

use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use std::collections::BTreeMap;

use super::models::TaggedImage;
use crate::Result;

/// Images carrying at least one of `tag_names`, ordered by image id
///
/// Each result lists every tag on the image, including tags that were not
/// searched for.
pub async fn get_image_data(
    conn: &mut SqliteConnection,
    tag_names: &[String],
) -> Result<Vec<TaggedImage>> {
    if tag_names.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT i.image_id, i.filename, t.name
        FROM images i
        JOIN image_tags it ON it.image_id = i.image_id
        JOIN tags t ON t.tag_id = it.tag_id
        WHERE i.image_id IN (
            SELECT it2.image_id FROM image_tags it2
            JOIN tags t2 ON t2.tag_id = it2.tag_id
            WHERE t2.name IN ("#,
    );
    let mut separated = builder.separated(", ");
    for name in tag_names {
        separated.push_bind(name);
    }
    separated.push_unseparated("))");
    builder.push(" ORDER BY i.image_id ASC, t.name ASC");

    let rows = builder.build().fetch_all(&mut *conn).await?;

    let mut by_image: BTreeMap<i64, TaggedImage> = BTreeMap::new();
    for row in rows {
        let image_id: i64 = row.try_get(0)?;
        let filename: String = row.try_get(1)?;
        let tag: String = row.try_get(2)?;

        by_image
            .entry(image_id)
            .or_insert_with(|| TaggedImage {
                filename,
                image_id,
                tags: Vec::new(),
            })
            .tags
            .push(tag);
    }

    Ok(by_image.into_values().collect())
}

/// Tag an image, creating the tag if needed. Returns false if it was already tagged.
pub async fn add_tag(conn: &mut SqliteConnection, image_id: i64, tag_name: &str) -> Result<bool> {
    sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
        .bind(tag_name)
        .execute(&mut *conn)
        .await?;

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO image_tags (image_id, tag_id)
        SELECT ?, tag_id FROM tags WHERE name = ?
        "#,
    )
    .bind(image_id)
    .bind(tag_name)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove a tag from an image. Returns false if the image did not carry it.
pub async fn remove_tag(
    conn: &mut SqliteConnection,
    image_id: i64,
    tag_name: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM image_tags
        WHERE image_id = ?
          AND tag_id = (SELECT tag_id FROM tags WHERE name = ?)
        "#,
    )
    .bind(image_id)
    .bind(tag_name)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn image_tags(conn: &mut SqliteConnection, image_id: i64) -> Result<Vec<String>> {
    let tags = sqlx::query_scalar::<_, String>(
        r#"
        SELECT t.name FROM tags t
        JOIN image_tags it ON it.tag_id = t.tag_id
        WHERE it.image_id = ?
        ORDER BY t.name ASC
        "#,
    )
    .bind(image_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(tags)
}

/// Names of tags attached to at least one image
pub async fn list_tag_names(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    let tags = sqlx::query_scalar::<_, String>(
        r#"
        SELECT DISTINCT t.name FROM tags t
        JOIN image_tags it ON it.tag_id = t.tag_id
        ORDER BY t.name ASC
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(tags)
}
