//! Error types for stream URL resolution.

use thiserror::Error;

/// Errors raised while fetching a wrapper document
///
/// These never reach engine callers: the resolver degrades to the input URL.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned status {0}")]
    Status(u16),

    /// Reading the response body failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Only http(s) URLs are fetched
    #[error("Not an http(s) URL: {0}")]
    UnsupportedUrl(String),

    /// Response had no body
    #[error("Empty response body")]
    EmptyBody,

    /// A superseding command asked us to stop
    #[error("Fetch interrupted")]
    Interrupted,
}

/// Result type for resolver operations.
pub type Result<T> = std::result::Result<T, ResolverError>;
