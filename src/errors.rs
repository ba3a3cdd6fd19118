//! Typed failure taxonomy for the collection and reporting pipeline.
//!
//! Every core operation returns `Result<T, CollectorError>`. The CLI boundary
//! converts to `anyhow` for display; the core never formats user-facing
//! messages beyond what the variants carry.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    /// Missing or invalid required settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A capture, repository, or explicitly named file is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// An external process exited with a status the contract does not allow.
    #[error("external tool '{tool}' failed with status {status}")]
    ExternalTool { tool: String, status: String },

    /// Malformed diff output, capture payload, or analyzer report.
    #[error("parse error: {message}")]
    Parse {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollectorError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn external_tool(tool: impl Into<String>, status: impl Into<String>) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            status: status.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            path: None,
        }
    }

    pub fn parse_with_path(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Parse {
            message: message.into(),
            path: Some(path.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CollectorError>;
