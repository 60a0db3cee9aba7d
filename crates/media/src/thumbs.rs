//! JPEG thumbnail rendering.
//!
//! Thumbnails mirror the gallery layout under the output directory:
//! `<thumbs_dir>/<folder>/<image name>.jpg`. Existing thumbnails are always
//! overwritten. Output is written to a temporary file and renamed into place.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use thumbwatch_core::{Error, ImageEntry, ThumbnailArtifact, ThumbnailGenerator};

/// [`ThumbnailGenerator`] backed by the `image` crate.
#[derive(Debug, Clone)]
pub struct ImageThumbnailGenerator {
    gallery_root: PathBuf,
    thumbs_dir: PathBuf,
    max_edge: u32,
}

impl ImageThumbnailGenerator {
    pub fn new(gallery_root: impl Into<PathBuf>, thumbs_dir: impl Into<PathBuf>, max_edge: u32) -> Self {
        Self { gallery_root: gallery_root.into(), thumbs_dir: thumbs_dir.into(), max_edge }
    }

    /// Where the thumbnail of `name` in `folder_path` is written.
    pub fn thumbnail_path(&self, folder_path: &str, name: &str) -> PathBuf {
        let dir = if folder_path.is_empty() { self.thumbs_dir.clone() } else { self.thumbs_dir.join(folder_path) };
        dir.join(format!("{name}.jpg"))
    }

    fn source_path(&self, folder_path: &str, name: &str) -> PathBuf {
        let dir = if folder_path.is_empty() { self.gallery_root.clone() } else { self.gallery_root.join(folder_path) };
        dir.join(name)
    }
}

fn render_thumbnail(source: &Path, dest: &Path, max_edge: u32) -> Result<(u32, u32), Error> {
    let name = source.display();
    let image = image::open(source).map_err(|e| Error::Thumbnail(format!("{name}: {e}")))?;

    // JPEG has no alpha channel.
    let thumb = DynamicImage::ImageRgb8(image.thumbnail(max_edge, max_edge).to_rgb8());

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::Thumbnail(format!("{}: {e}", parent.display())))?;
    }

    let tmp = dest.with_extension("jpg.tmp");
    thumb
        .save_with_format(&tmp, ImageFormat::Jpeg)
        .map_err(|e| Error::Thumbnail(format!("{name}: {e}")))?;
    fs::rename(&tmp, dest).map_err(|e| Error::Thumbnail(format!("{}: {e}", dest.display())))?;

    Ok((thumb.width(), thumb.height()))
}

#[async_trait]
impl ThumbnailGenerator for ImageThumbnailGenerator {
    async fn generate(&self, folder_path: &str, image: &ImageEntry) -> Result<ThumbnailArtifact, Error> {
        let source = self.source_path(folder_path, &image.name);
        let dest = self.thumbnail_path(folder_path, &image.name);
        let max_edge = self.max_edge;

        let output = dest.clone();
        let (width, height) = tokio::task::spawn_blocking(move || render_thumbnail(&source, &output, max_edge))
            .await
            .map_err(|e| Error::Thumbnail(format!("render task failed: {e}")))??;

        Ok(ThumbnailArtifact { file_path: dest, width, height })
    }
}
