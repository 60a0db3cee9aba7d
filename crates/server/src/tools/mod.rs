//! MCP tool implementations.
//!
//! This module contains all tools exposed by the thumbwatch server.

pub mod history;
pub mod rebuild;
pub mod records;
pub mod status;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use thumbwatch_core::Error;

pub use history::{HistoryCleanupParams, cleanup_impl};
pub use rebuild::{CacheRebuildParams, rebuild_impl};
pub use records::{CacheRecordsParams, records_impl};
pub use status::{CacheStatusBatchParams, CacheStatusParams, status_batch_impl, status_impl};

/// Structured failure reported inline (batch items).
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct ToolErrorInfo {
    pub kind: String,
    pub message: String,
}

impl From<&Error> for ToolErrorInfo {
    fn from(err: &Error) -> Self {
        Self { kind: err.kind().to_string(), message: err.to_string() }
    }
}

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| McpError::internal_error(format!("Failed to serialize output: {e}"), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Reject a missing folder path; `""` (the gallery root) is accepted.
pub(crate) fn require_folder_path(folder_path: Option<String>) -> Result<String, Error> {
    folder_path.ok_or_else(|| Error::InvalidInput("folder_path is required (use \"\" for the gallery root)".into()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::Path;
    use std::sync::Arc;

    use image::{ImageBuffer, Rgb};
    use rmcp::model::CallToolResult;
    use serde::de::DeserializeOwned;
    use tempfile::TempDir;
    use thumbwatch_core::{CacheDb, HistoryRetention, ImageSource, Rebuilder, StatusService, ThumbnailGenerator};
    use thumbwatch_media::{FsImageSource, ImageThumbnailGenerator};

    pub struct Gallery {
        pub dir: TempDir,
        pub db: CacheDb,
        pub status: StatusService,
        pub rebuilder: Rebuilder,
        pub retention: HistoryRetention,
    }

    impl Gallery {
        pub async fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = dir.path().join("gallery");
            let thumbs = dir.path().join("thumbs");
            std::fs::create_dir_all(&root).unwrap();

            let db = CacheDb::open_in_memory().await.unwrap();
            let source: Arc<dyn ImageSource> = Arc::new(FsImageSource::new(&root));
            let generator: Arc<dyn ThumbnailGenerator> = Arc::new(ImageThumbnailGenerator::new(&root, &thumbs, 64));
            let status = StatusService::new(db.clone(), source.clone(), 100, 8);
            let rebuilder = Rebuilder::new(db.clone(), source, generator);
            let retention = HistoryRetention::new(db.clone(), 168.0);
            Self { dir, db, status, rebuilder, retention }
        }

        pub fn root(&self) -> std::path::PathBuf {
            self.dir.path().join("gallery")
        }

        /// Write a small JPEG at `relative` under the gallery root.
        pub fn add_image(&self, relative: &str) {
            let path = self.root().join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            ImageBuffer::from_fn(120, 80, |_x, _y| Rgb([90_u8, 120_u8, 150_u8]))
                .save(&path)
                .unwrap();
        }

        pub fn add_folder(&self, relative: &str) {
            std::fs::create_dir_all(self.root().join(relative)).unwrap();
        }

        pub fn thumbs_exist(&self, relative: &str) -> bool {
            Path::new(&self.dir.path().join("thumbs").join(format!("{relative}.jpg"))).exists()
        }
    }

    /// Parse the JSON text content of a tool result.
    pub fn parse_output<T: DeserializeOwned>(result: &CallToolResult) -> T {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
