//! Key-value document store
//!
//! Items are addressed by (table, hash key) and carry a JSON attribute map.
//! The store lives outside the request transaction: writes are visible
//! immediately and are made from background jobs.

mod sqlite;
pub mod tag;

pub use sqlite::SqliteDocumentStore;
pub use tag::TagDocument;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::Result;

/// One stored document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Item {
    pub hash_key: String,
    pub attrs: Map<String, Value>,
}

impl Item {
    pub fn new(hash_key: impl Into<String>) -> Self {
        Self {
            hash_key: hash_key.into(),
            attrs: Map::new(),
        }
    }

    pub fn get_str(&self, attr: &str) -> Option<&str> {
        self.attrs.get(attr).and_then(Value::as_str)
    }

    pub fn set(&mut self, attr: &str, value: impl Into<Value>) {
        self.attrs.insert(attr.to_string(), value.into());
    }
}

/// A named table of items
#[async_trait]
pub trait DocumentTable: Send + Sync {
    /// Fetch an item; `None` when no item has that hash key
    async fn get_item(&self, hash_key: &str) -> Result<Option<Item>>;

    /// Create or replace an item
    async fn put_item(&self, item: &Item) -> Result<()>;
}

/// Hands out table handles
pub trait DocumentStore: Send + Sync {
    fn table(&self, name: &str) -> Arc<dyn DocumentTable>;
}
