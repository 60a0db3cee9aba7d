//! Gallery listing from the local filesystem.
//!
//! Folder paths are relative to the gallery root and use `/` separators; the
//! root itself is `""`. Hidden entries (leading `.`) and the thumbnail output
//! directory are never listed.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use thumbwatch_core::{Error, ImageEntry, ImageSource};
use walkdir::WalkDir;

/// Extensions treated as images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// [`ImageSource`] over a directory tree.
#[derive(Debug, Clone)]
pub struct FsImageSource {
    root: PathBuf,
    excluded: Vec<PathBuf>,
}

impl FsImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), excluded: Vec::new() }
    }

    /// Skip `dir` (and everything below it) during folder enumeration.
    pub fn exclude(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded.push(dir.into());
        self
    }

    fn folder_dir(&self, folder_path: &str) -> PathBuf {
        if folder_path.is_empty() { self.root.clone() } else { self.root.join(folder_path) }
    }
}

fn list_images_blocking(dir: &Path, folder_path: &str) -> Result<Vec<ImageEntry>, Error> {
    let read_dir = fs::read_dir(dir).map_err(|e| Error::Io(format!("cannot list folder '{folder_path}': {e}")))?;

    let mut images = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| Error::Io(format!("cannot list folder '{folder_path}': {e}")))?;
        let path = entry.path();
        let Ok(name) = entry.file_name().into_string() else {
            tracing::debug!(path = %path.display(), "skipping non UTF-8 file name");
            continue;
        };
        if is_hidden(&name) || !is_image_file(&path) {
            continue;
        }

        let metadata = match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), "skipping unreadable image: {e}");
                continue;
            }
        };

        let modified_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();

        images.push(ImageEntry { name, size: metadata.len(), modified_ms });
    }

    images.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(images)
}

fn list_folders_blocking(root: &Path, excluded: &[PathBuf]) -> Result<Vec<String>, Error> {
    if !root.is_dir() {
        return Err(Error::Io(format!("gallery root is not a directory: {}", root.display())));
    }

    let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        let hidden = entry.file_name().to_str().map(is_hidden).unwrap_or(true);
        !hidden && !excluded.iter().any(|dir| entry.path().starts_with(dir))
    });

    let mut folders = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable gallery entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let segments: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
        match segments {
            Some(segments) => folders.push(segments.join("/")),
            None => tracing::debug!(path = %entry.path().display(), "skipping non UTF-8 folder"),
        }
    }

    folders.sort();
    Ok(folders)
}

#[async_trait]
impl ImageSource for FsImageSource {
    async fn list_images(&self, folder_path: &str) -> Result<Vec<ImageEntry>, Error> {
        let dir = self.folder_dir(folder_path);
        let folder_path = folder_path.to_string();
        tokio::task::spawn_blocking(move || list_images_blocking(&dir, &folder_path))
            .await
            .map_err(|e| Error::Io(format!("listing task failed: {e}")))?
    }

    async fn list_folders(&self) -> Result<Vec<String>, Error> {
        let root = self.root.clone();
        let excluded = self.excluded.clone();
        tokio::task::spawn_blocking(move || list_folders_blocking(&root, &excluded))
            .await
            .map_err(|e| Error::Io(format!("enumeration task failed: {e}")))?
    }
}
