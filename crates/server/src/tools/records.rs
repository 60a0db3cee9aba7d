//! cache_records tool implementation.
//!
//! Lists every folder record with aggregate stats, optionally with the
//! history and change logs.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thumbwatch_core::CacheDb;
use thumbwatch_core::CacheStats;
use thumbwatch_core::FolderHashRecord;
use thumbwatch_core::cache::{ChangeRecord, HistoryEntry};

/// Parameters for the cache_records tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheRecordsParams {
    /// Include history and change entries.
    #[serde(default)]
    pub include_history: bool,
}

/// Output from the cache_records tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecordsOutput {
    pub records: Vec<FolderHashRecord>,
    pub stats: CacheStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<Vec<ChangeRecord>>,
}

/// Implementation of the cache_records tool.
pub async fn records_impl(db: &CacheDb, params: CacheRecordsParams) -> Result<CallToolResult, McpError> {
    let output = if params.include_history {
        let snapshot = db.list_all().await?;
        CacheRecordsOutput {
            stats: CacheStats::from_records(&snapshot.records),
            records: snapshot.records,
            history: Some(snapshot.history),
            changes: Some(snapshot.changes),
        }
    } else {
        let records = db.list_records().await?;
        CacheRecordsOutput { stats: CacheStats::from_records(&records), records, history: None, changes: None }
    };

    super::json_result(&output)
}
