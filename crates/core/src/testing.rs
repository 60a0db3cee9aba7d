//! In-memory collaborators for unit tests.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::Error;
use crate::source::{ImageEntry, ImageSource, ThumbnailArtifact, ThumbnailGenerator};

pub fn image(name: &str, size: u64, modified_ms: i64) -> ImageEntry {
    ImageEntry { name: name.to_string(), size, modified_ms }
}

/// Gallery held in memory: folder path -> images.
#[derive(Default)]
pub struct MemorySource {
    folders: Mutex<BTreeMap<String, Vec<ImageEntry>>>,
    unreadable: Mutex<HashSet<String>>,
}

impl MemorySource {
    pub fn set_folder(&self, folder: &str, images: Vec<ImageEntry>) {
        self.folders.lock().unwrap().insert(folder.to_string(), images);
    }

    pub fn add_image(&self, folder: &str, entry: ImageEntry) {
        self.folders.lock().unwrap().entry(folder.to_string()).or_default().push(entry);
    }

    pub fn remove_folder(&self, folder: &str) {
        self.folders.lock().unwrap().remove(folder);
    }

    /// Keep the folder in enumeration results but fail listing it.
    pub fn make_unreadable(&self, folder: &str) {
        self.unreadable.lock().unwrap().insert(folder.to_string());
    }
}

#[async_trait]
impl ImageSource for MemorySource {
    async fn list_images(&self, folder_path: &str) -> Result<Vec<ImageEntry>, Error> {
        if self.unreadable.lock().unwrap().contains(folder_path) {
            return Err(Error::Io(format!("{folder_path}: permission denied")));
        }
        self.folders
            .lock()
            .unwrap()
            .get(folder_path)
            .cloned()
            .ok_or_else(|| Error::Io(format!("{folder_path}: no such folder")))
    }

    async fn list_folders(&self) -> Result<Vec<String>, Error> {
        let mut folders: Vec<String> = self.folders.lock().unwrap().keys().cloned().collect();
        for folder in self.unreadable.lock().unwrap().iter() {
            if !folders.contains(folder) {
                folders.push(folder.clone());
            }
        }
        Ok(folders)
    }
}

/// Generator that succeeds unless the image name contains `corrupt`.
#[derive(Default)]
pub struct FakeGenerator {
    pub calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThumbnailGenerator for FakeGenerator {
    async fn generate(&self, folder_path: &str, image: &ImageEntry) -> Result<ThumbnailArtifact, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image.name.contains("corrupt") {
            return Err(Error::Thumbnail(format!("{}: unsupported image data", image.name)));
        }
        Ok(ThumbnailArtifact {
            file_path: PathBuf::from(format!("thumbs/{folder_path}/{}.jpg", image.name)),
            width: 256,
            height: 170,
        })
    }
}
