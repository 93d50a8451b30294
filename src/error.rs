//! Error taxonomy shared by the lookup, encoder and ledger layers.
//!
//! Library code returns [`ToolError`]; the command handlers in `lib.rs` wrap it
//! in `anyhow` with file/job context. [`TransformError`] never leaves a row: the
//! encoder renders it inline as `!ERROR(<message>)`.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to read {path:?}: {message}")]
    SourceRead { path: PathBuf, message: String },
    #[error("failed to write {path:?}: {message}")]
    SourceWrite { path: PathBuf, message: String },
    #[error(
        "serial {serial} is already assigned to code '{code}' (current max serial is {max_serial})"
    )]
    Conflict {
        code: String,
        serial: i64,
        max_serial: i64,
    },
    #[error("serial ledger error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl ToolError {
    pub fn config(message: impl Into<String>) -> Self {
        ToolError::Config(message.into())
    }

    pub fn read(path: &Path, message: impl ToString) -> Self {
        ToolError::SourceRead {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn write(path: &Path, message: impl ToString) -> Self {
        ToolError::SourceWrite {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ToolError>;

/// Failure of a single cell transform.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TransformError(pub String);

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        TransformError(message.into())
    }

    /// Inline marker written in place of the failed cell's fragment.
    pub fn marker(&self) -> String {
        format!("!ERROR({})", self.0)
    }
}
