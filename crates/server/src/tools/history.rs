//! history_cleanup tool implementation.
//!
//! Prunes history and change entries older than a retention window, or
//! clears both logs entirely with `action: "clear"`.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thumbwatch_core::{CleanupOutcome, Error, HistoryRetention, MAX_RETENTION_HOURS};

use super::json_result;

/// Parameters for the history_cleanup tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct HistoryCleanupParams {
    /// "cleanup" (default) or "clear" to remove every history and change entry.
    pub action: Option<String>,

    /// Retention window in hours, a positive number up to 876000. Defaults to the configured window.
    pub retention_hours: Option<Value>,
}

/// Output of `action: "clear"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearOutput {
    pub cleared: bool,
}

/// Accept a positive number up to [`MAX_RETENTION_HOURS`], given as a JSON number or numeric string.
fn parse_retention_hours(value: &Value) -> Result<f64, Error> {
    let hours = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match hours {
        Some(h) if h > 0.0 && h <= MAX_RETENTION_HOURS => Ok(h),
        _ => Err(Error::InvalidInput(format!(
            "retention_hours must be a positive number no greater than {MAX_RETENTION_HOURS}, got {value}"
        ))),
    }
}

/// Implementation of the history_cleanup tool.
pub async fn cleanup_impl(
    retention: &HistoryRetention, params: HistoryCleanupParams,
) -> Result<CallToolResult, McpError> {
    match params.action.as_deref().unwrap_or("cleanup") {
        "cleanup" => {
            let hours = params.retention_hours.as_ref().map(parse_retention_hours).transpose()?;
            let outcome: CleanupOutcome = retention.cleanup_history_or_default(hours).await?;
            json_result(&outcome)
        }
        "clear" => {
            retention.clear_all_history().await?;
            json_result(&ClearOutput { cleared: true })
        }
        other => Err(Error::InvalidInput(format!("unknown action '{other}', expected 'cleanup' or 'clear'")).into()),
    }
}
