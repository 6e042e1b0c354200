use thiserror::Error;

/// A failed page fetch. Recoverable: the fetcher retries it, then stops and
/// keeps what it already has.
#[derive(Error, Debug)]
pub enum FetchError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[cfg(feature = "http")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The source answered but the payload was unusable.
    #[error("source error: {0}")]
    Source(String),
}
