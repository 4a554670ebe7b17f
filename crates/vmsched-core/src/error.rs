//! Error types for the exchange channel

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while moving documents through the exchange channel
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("IO error during {op} on {path:?}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request slot occupied: {0:?}")]
    Busy(PathBuf),

    #[error("Timed out after {0:?} waiting for a response")]
    Timeout(Duration),

    #[error("Injected failure: {0}")]
    Injected(&'static str),
}

impl ChannelError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from malformed document contents
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Malformed request or response contents
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("document is empty")]
    Empty,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for channel operations
pub type Result<T> = std::result::Result<T, ChannelError>;
