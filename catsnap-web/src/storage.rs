//! Image blob storage
//!
//! Blobs are content addressed: the filename is the hex SHA-256 of the bytes,
//! so saving the same image twice is a no-op.

use async_trait::async_trait;
use catsnap_common::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::debug;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return the filename they are stored under
    async fn save(&self, bytes: &[u8]) -> Result<String>;

    async fn read(&self, filename: &str) -> Result<Vec<u8>>;

    /// Public URL of a stored blob
    fn url_for_filename(&self, filename: &str) -> String;
}

pub fn filename_for(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Stored filenames are lowercase hex; anything else is rejected before it
/// reaches the filesystem.
fn validate_filename(filename: &str) -> Result<()> {
    let valid = !filename.is_empty()
        && filename
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid blob filename: {}", filename)))
    }
}

pub struct FilesystemBlobStore {
    dir: PathBuf,
    public_base_url: String,
}

impl FilesystemBlobStore {
    pub fn new(dir: PathBuf, public_base_url: &str) -> Self {
        Self {
            dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn save(&self, bytes: &[u8]) -> Result<String> {
        let filename = filename_for(bytes);
        let path = self.dir.join(&filename);

        if tokio::fs::try_exists(&path).await? {
            debug!(filename = %filename, "Blob already stored");
            return Ok(filename);
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        // Write under a temporary name so readers never see a partial blob
        let partial = self.dir.join(format!("{}.partial", filename));
        tokio::fs::write(&partial, bytes).await?;
        tokio::fs::rename(&partial, &path).await?;

        debug!(filename = %filename, size = bytes.len(), "Blob stored");
        Ok(filename)
    }

    async fn read(&self, filename: &str) -> Result<Vec<u8>> {
        validate_filename(filename)?;

        match tokio::fs::read(self.dir.join(filename)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Blob not found: {}", filename)))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn url_for_filename(&self, filename: &str) -> String {
        format!("{}/{}", self.public_base_url, filename)
    }
}
