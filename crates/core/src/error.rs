//! Unified error types for thumbwatch.
//!
//! Each variant belongs to one of four kinds surfaced to RPC callers:
//! `VALIDATION_ERROR`, `IO_ERROR`, `REBUILD_ERROR` and `STORE_ERROR`.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the thumbnail cache engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or missing input (e.g., oversized batch, bad retention hours).
    #[error("VALIDATION_ERROR: {0}")]
    InvalidInput(String),

    /// A folder could not be listed or read.
    #[error("IO_ERROR: {0}")]
    Io(String),

    /// Thumbnail regeneration failed for a whole folder.
    #[error("REBUILD_ERROR: {0}")]
    Rebuild(String),

    /// Thumbnail generation failed for a single image.
    #[error("THUMBNAIL_FAILED: {0}")]
    Thumbnail(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// Error kind reported to RPC callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "VALIDATION_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Rebuild(_) | Error::Thumbnail(_) => "REBUILD_ERROR",
            Error::Database(_) | Error::MigrationFailed(_) => "STORE_ERROR",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => -32602,
            Error::Io(_) => -32003,
            Error::Rebuild(_) | Error::Thumbnail(_) => -32004,
            Error::Database(_) | Error::MigrationFailed(_) => -32002,
        };

        McpError {
            code: ErrorCode(code),
            message: err.to_string().into(),
            data: Some(serde_json::json!({ "kind": err.kind() })),
        }
    }
}
