//! Folder fingerprints.
//!
//! A folder's fingerprint is a SHA-256 digest over its image entries. Entries
//! are sorted by name before hashing, so the order in which the filesystem
//! lists them never affects the result.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::Error;
use crate::source::{ImageEntry, ImageSource};

/// Compute the fingerprint of a folder from its image listing.
pub fn compute_folder_hash(entries: &[ImageEntry]) -> String {
    let mut sorted: Vec<&ImageEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = Sha256::new();
    for entry in sorted {
        hasher.update(entry.name.as_bytes());
        hasher.update(b"\0");
        hasher.update(entry.size.to_le_bytes());
        hasher.update(entry.modified_ms.to_le_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Lists a folder through an [`ImageSource`] and fingerprints the result.
#[derive(Clone)]
pub struct FolderHasher {
    source: Arc<dyn ImageSource>,
}

impl FolderHasher {
    pub fn new(source: Arc<dyn ImageSource>) -> Self {
        Self { source }
    }

    /// Fingerprint the current contents of `folder_path`.
    ///
    /// Fails with [`Error::Io`] when the folder cannot be listed.
    pub async fn compute(&self, folder_path: &str) -> Result<String, Error> {
        let entries = self.source.list_images(folder_path).await?;
        Ok(compute_folder_hash(&entries))
    }
}
