//! SQLite-backed document store (`documents` table)

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use std::sync::Arc;

use super::{DocumentStore, DocumentTable, Item};
use crate::Result;

#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn table(&self, name: &str) -> Arc<dyn DocumentTable> {
        Arc::new(SqliteDocumentTable {
            pool: self.pool.clone(),
            table_name: name.to_string(),
        })
    }
}

struct SqliteDocumentTable {
    pool: SqlitePool,
    table_name: String,
}

#[async_trait]
impl DocumentTable for SqliteDocumentTable {
    async fn get_item(&self, hash_key: &str) -> Result<Option<Item>> {
        let attrs: Option<String> = sqlx::query_scalar(
            "SELECT attrs FROM documents WHERE table_name = ? AND hash_key = ?",
        )
        .bind(&self.table_name)
        .bind(hash_key)
        .fetch_optional(&self.pool)
        .await?;

        match attrs {
            Some(raw) => {
                let attrs: Map<String, Value> = serde_json::from_str(&raw)?;
                Ok(Some(Item {
                    hash_key: hash_key.to_string(),
                    attrs,
                }))
            }
            None => Ok(None),
        }
    }

    async fn put_item(&self, item: &Item) -> Result<()> {
        let attrs = serde_json::to_string(&item.attrs)?;

        sqlx::query(
            r#"
            INSERT INTO documents (table_name, hash_key, attrs) VALUES (?, ?, ?)
            ON CONFLICT(table_name, hash_key) DO UPDATE SET
                attrs = excluded.attrs,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&self.table_name)
        .bind(&item.hash_key)
        .bind(attrs)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
