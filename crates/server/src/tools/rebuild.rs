//! cache_rebuild tool implementation.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thumbwatch_core::Rebuilder;

use super::{json_result, require_folder_path};

/// Parameters for the cache_rebuild tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheRebuildParams {
    /// Folder path relative to the gallery root. Use "" for the root itself.
    pub folder_path: Option<String>,
}

/// Implementation of the cache_rebuild tool.
pub async fn rebuild_impl(rebuilder: &Rebuilder, params: CacheRebuildParams) -> Result<CallToolResult, McpError> {
    let folder_path = require_folder_path(params.folder_path)?;
    let outcome = rebuilder.rebuild_folder_thumbnails(&folder_path).await?;
    json_result(&outcome)
}
