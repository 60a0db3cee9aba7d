//! Collaborator contracts consumed by the cache engine.
//!
//! The engine never touches the filesystem or decodes images itself. It lists
//! folders through an [`ImageSource`] and renders thumbnails through a
//! [`ThumbnailGenerator`]; `thumbwatch-media` provides the production adapters.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;

/// One image inside a folder, as reported by the listing provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    /// File name relative to its folder.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time in milliseconds since the Unix epoch.
    pub modified_ms: i64,
}

/// A generated thumbnail.
#[derive(Debug, Clone)]
pub struct ThumbnailArtifact {
    pub file_path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Image-listing and metadata provider.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// List the images directly inside `folder_path` (not recursive).
    ///
    /// Returns [`Error::Io`] if the folder cannot be listed.
    async fn list_images(&self, folder_path: &str) -> Result<Vec<ImageEntry>, Error>;

    /// Enumerate every folder of the gallery, the root (`""`) included.
    async fn list_folders(&self) -> Result<Vec<String>, Error>;
}

/// Thumbnail renderer for a single image.
#[async_trait]
pub trait ThumbnailGenerator: Send + Sync {
    async fn generate(&self, folder_path: &str, image: &ImageEntry) -> Result<ThumbnailArtifact, Error>;
}

/// Normalize a folder path into its record key.
///
/// Backslashes become slashes, empty and `.` segments are dropped and leading
/// or trailing slashes are removed. Case is preserved. The empty string is the
/// gallery root. Paths with `..` segments are rejected.
pub fn normalize_folder_path(raw: &str) -> Result<String, Error> {
    let mut segments = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(Error::InvalidInput(format!("folder path must not contain '..': {raw}")));
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}
