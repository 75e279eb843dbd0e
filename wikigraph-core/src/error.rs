use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Losing write capability is fatal for a crawl.
    #[error("Failed to persist {}: {source}", path.display())]
    PersistenceWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed snapshot {}: {reason}", path.display())]
    MalformedSnapshot { path: PathBuf, reason: String },

    #[error("Malformed edge key {0:?}")]
    MalformedEdgeKey(String),

    #[error("Invalid title {0:?}")]
    InvalidTitle(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
