//! Filesystem and image adapters for thumbwatch.
//!
//! - [`FsImageSource`] lists gallery folders and their images from disk
//! - [`ImageThumbnailGenerator`] renders JPEG thumbnails with the `image` crate

pub mod listing;
pub mod thumbs;

pub use listing::{FsImageSource, IMAGE_EXTENSIONS, is_image_file};
pub use thumbs::ImageThumbnailGenerator;
