//! Error types for session providers.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP/network error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the provider.
    #[error("provider returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// The provider has no session for this event.
    #[error("no race session found for {year} round {round}")]
    NotFound { year: i64, round: i64 },

    /// The document is not a session document at all.
    #[error("malformed session document: {0}")]
    Decode(#[from] serde_json::Error),

    /// Reading or writing a local file (cache entry or `--file` document).
    #[error("i/o error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error (bad base URL, client setup).
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Get a short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Http(e) if e.is_timeout() => "timeout",
            Self::Http(_) => "http_error",
            Self::Status { .. } => "http_status",
            Self::NotFound { .. } => "not_found",
            Self::Decode(_) => "decode_error",
            Self::Io { .. } => "io_error",
            Self::Config(_) => "config_error",
        }
    }
}
