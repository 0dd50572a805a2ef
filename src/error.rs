use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the engine. Stale background results and user
/// cancellation are ordinary outcomes, not errors, and never appear here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("invalid rename: {0}")]
    InvalidRename(String),

    #[error("note not found: {0}")]
    NotFound(String),

    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
