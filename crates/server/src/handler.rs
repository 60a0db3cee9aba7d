//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::{
    CacheRebuildParams, CacheRecordsParams, CacheStatusBatchParams, CacheStatusParams, HistoryCleanupParams,
    cleanup_impl, rebuild_impl, records_impl, status_batch_impl, status_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use thumbwatch_core::{CacheDb, HistoryRetention, Rebuilder, StatusService};

/// The main MCP server handler for thumbwatch.
#[derive(Clone)]
pub struct ThumbwatchServer {
    tool_router: ToolRouter<Self>,
    db: CacheDb,
    status: StatusService,
    rebuilder: Rebuilder,
    retention: HistoryRetention,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ThumbwatchServer {
    /// Create a new server handler over shared services.
    pub fn new(db: CacheDb, status: StatusService, rebuilder: Rebuilder, retention: HistoryRetention) -> Self {
        Self { tool_router: Self::tool_router(), db, status, rebuilder, retention }
    }

    #[tool(description = "Check whether a gallery folder's thumbnails match its current contents. \
                          Records the folder's fresh fingerprint. Use \"\" for the gallery root.")]
    async fn cache_status(&self, params: Parameters<CacheStatusParams>) -> Result<CallToolResult, McpError> {
        status_impl(&self.status, params.0).await
    }

    /// Batch status check; failures are reported per folder.
    #[tool(description = "Check cache status for many folders at once, up to the configured batch limit (100 by default). \
                          Per-folder failures are reported inline.")]
    async fn cache_status_batch(&self, params: Parameters<CacheStatusBatchParams>) -> Result<CallToolResult, McpError> {
        status_batch_impl(&self.status, params.0).await
    }

    #[tool(description = "Regenerate every thumbnail of a folder and mark its cache current.")]
    async fn cache_rebuild(&self, params: Parameters<CacheRebuildParams>) -> Result<CallToolResult, McpError> {
        rebuild_impl(&self.rebuilder, params.0).await
    }

    #[tool(description = "List all folder cache records with aggregate stats, optionally with history and changes.")]
    async fn cache_records(&self, params: Parameters<CacheRecordsParams>) -> Result<CallToolResult, McpError> {
        records_impl(&self.db, params.0).await
    }

    /// Retention cleanup, or a full clear with `action: "clear"`.
    #[tool(description = "Delete history and change entries older than retention_hours \
                          (defaults to the configured window), or clear them all with action \"clear\".")]
    async fn history_cleanup(&self, params: Parameters<HistoryCleanupParams>) -> Result<CallToolResult, McpError> {
        cleanup_impl(&self.retention, params.0).await
    }
}

impl ServerHandler for ThumbwatchServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "thumbwatch".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
