use thiserror::Error;

/// Per-page failure reported by a link source.
///
/// A `FetchError` is transient from the crawler's point of view: the page is
/// left unvisited and retried on a later run.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
