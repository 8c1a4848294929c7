//! Extracted-content writer
//!
//! Persists extracted page text to `{data_dir}/content/{xx}/{sha256(url)}.txt`,
//! where `xx` shards by the hash prefix. The returned path goes into the
//! URL's visited record.

use crate::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Writes extracted text to the sharded content tree
pub struct ContentWriter {
    root: PathBuf,
}

impl ContentWriter {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join("content"),
        }
    }

    /// The content file path for a URL
    pub fn content_path(&self, url: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(url.as_bytes()));
        self.root.join(&digest[..2]).join(format!("{}.txt", digest))
    }

    /// Writes the extracted text for a URL, returning the file path
    pub async fn write(&self, url: &str, text: &str) -> Result<PathBuf> {
        let path = self.content_path(url);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, text).await?;
        Ok(path)
    }
}
