//! Error types for backend HTTP calls.

use thiserror::Error;

/// Errors that can occur while talking to the backend proxy.
#[derive(Error, Debug)]
pub enum HttpError {
    /// The backend rejected the credentials (401 or 403).
    #[error("Backend rejected the access token")]
    Unauthorized,

    /// Any other non-success status.
    #[error("Backend returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Connection, TLS or body read failure.
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The body was not the expected JSON shape.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// The configured base URL cannot be used.
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl HttpError {
    /// Returns true for authorization failures.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
