//! Error types for the HTTP fetch layer

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while fetching remote resources
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (connect, TLS, mid-body disconnect)
    #[error("request to '{url}' failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("'{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// File system failure while writing the response body
    #[error("file operation failed on '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Response body could not be decoded as the expected JSON shape
    #[error("invalid JSON payload from '{url}'")]
    InvalidPayload {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// All attempts failed; wraps the last error with the attempt count
    #[error("'{url}' failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: usize,
        #[source]
        last: Box<FetchError>,
    },

    /// Caller cancelled the transfer
    #[error("download of '{url}' cancelled")]
    Cancelled { url: String },
}

pub type Result<T> = std::result::Result<T, FetchError>;

impl FetchError {
    /// Whether a failed attempt should be retried.
    ///
    /// A non-success status is retried like any transport error; only
    /// cancellation and already-exhausted errors stop the loop early.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            FetchError::Cancelled { .. } | FetchError::RetriesExhausted { .. }
        )
    }
}
