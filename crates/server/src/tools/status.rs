//! cache_status and cache_status_batch tool implementations.
//!
//! Both tools report whether a folder's thumbnails still match its contents.
//! Checking a folder records its fresh fingerprint as a side effect.

use std::collections::BTreeMap;

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thumbwatch_core::{FolderStatus, StatusService};

use super::{ToolErrorInfo, json_result, require_folder_path};

/// Parameters for the cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusParams {
    /// Folder path relative to the gallery root. Use "" for the root itself.
    pub folder_path: Option<String>,
}

/// Parameters for the cache_status_batch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusBatchParams {
    /// Folder paths relative to the gallery root.
    pub folder_paths: Vec<String>,
}

/// Per-folder entry of a batch result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FolderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolErrorInfo>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Output from the cache_status_batch tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatusBatchOutput {
    pub results: BTreeMap<String, BatchItem>,
    pub summary: BatchSummary,
}

/// Implementation of the cache_status tool.
pub async fn status_impl(service: &StatusService, params: CacheStatusParams) -> Result<CallToolResult, McpError> {
    let folder_path = require_folder_path(params.folder_path)?;
    let status = service.get_folder_cache_status(&folder_path).await?;
    json_result(&status)
}

/// Implementation of the cache_status_batch tool.
pub async fn status_batch_impl(
    service: &StatusService, params: CacheStatusBatchParams,
) -> Result<CallToolResult, McpError> {
    let outcomes = service.get_folder_cache_status_batch(&params.folder_paths).await?;

    let mut summary = BatchSummary { total: outcomes.len(), succeeded: 0, failed: 0 };
    let results = outcomes
        .into_iter()
        .map(|(folder, outcome)| {
            let item = match outcome {
                Ok(status) => {
                    summary.succeeded += 1;
                    BatchItem { status: Some(status), error: None }
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(folder = %folder, "batch status check failed: {e}");
                    BatchItem { status: None, error: Some(ToolErrorInfo::from(&e)) }
                }
            };
            (folder, item)
        })
        .collect();

    json_result(&CacheStatusBatchOutput { results, summary })
}
