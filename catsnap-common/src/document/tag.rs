//! Tag documents: tag name → list of image filenames
//!
//! Stored in table `tag`, keyed by tag name. The `filenames` attribute holds a
//! JSON-encoded list of strings.

use std::sync::{Arc, OnceLock};

use super::{DocumentStore, DocumentTable, Item};
use crate::Result;

pub const TAG_TABLE: &str = "tag";
const FILENAMES_ATTR: &str = "filenames";

pub struct TagDocument {
    name: String,
    store: Arc<dyn DocumentStore>,
    stored_table: OnceLock<Arc<dyn DocumentTable>>,
}

impl TagDocument {
    pub fn new(name: impl Into<String>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            name: name.into(),
            store,
            stored_table: OnceLock::new(),
        }
    }

    /// Use an already opened table instead of asking a store
    pub fn with_table(name: impl Into<String>, table: Arc<dyn DocumentTable>) -> Self {
        Self::new(name, Arc::new(OpenedTable(table)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table handle, opened on first use
    fn table(&self) -> &Arc<dyn DocumentTable> {
        self.stored_table.get_or_init(|| self.store.table(TAG_TABLE))
    }

    /// Filenames tagged with this tag; empty when the tag has no document
    pub async fn get_filenames(&self) -> Result<Vec<String>> {
        let item = self.table().get_item(&self.name).await?;
        match item {
            Some(item) => decode_filenames(&item),
            None => Ok(Vec::new()),
        }
    }

    /// Append `filename`, creating the document if needed. Filenames stay unique.
    pub async fn add_file(&self, filename: &str) -> Result<()> {
        let table = self.table();
        let (mut item, mut filenames) = match table.get_item(&self.name).await? {
            Some(item) => {
                let filenames = decode_filenames(&item)?;
                (item, filenames)
            }
            None => (Item::new(self.name.clone()), Vec::new()),
        };

        if !filenames.iter().any(|f| f == filename) {
            filenames.push(filename.to_string());
        }

        item.set(FILENAMES_ATTR, serde_json::to_string(&filenames)?);
        table.put_item(&item).await
    }

    /// Drop `filename` from the document. Missing documents are left alone.
    pub async fn remove_file(&self, filename: &str) -> Result<()> {
        let table = self.table();
        let Some(mut item) = table.get_item(&self.name).await? else {
            return Ok(());
        };

        let mut filenames = decode_filenames(&item)?;
        filenames.retain(|f| f != filename);

        item.set(FILENAMES_ATTR, serde_json::to_string(&filenames)?);
        table.put_item(&item).await
    }
}

struct OpenedTable(Arc<dyn DocumentTable>);

impl DocumentStore for OpenedTable {
    fn table(&self, _name: &str) -> Arc<dyn DocumentTable> {
        self.0.clone()
    }
}

fn decode_filenames(item: &Item) -> Result<Vec<String>> {
    match item.get_str(FILENAMES_ATTR) {
        Some(raw) => Ok(serde_json::from_str(raw)?),
        None => Ok(Vec::new()),
    }
}
