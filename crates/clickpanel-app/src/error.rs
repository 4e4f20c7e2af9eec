//! Error types shared by the session and cache components.

use clickpanel_core::TaskId;
use clickpanel_http::HttpError;
use thiserror::Error;

/// Failure of a remote resource fetch.
///
/// Cloneable so a single shared fetch can hand the same error to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport failure or unexpected status.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend rejected the session token.
    #[error("Not authorized")]
    Unauthorized,

    /// The response could not be decoded.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The session changed while the fetch was running; its result was
    /// dropped.
    #[error("Session changed during the fetch")]
    SessionChanged,

    /// A newer task load superseded this one.
    #[error("Load of task {task} was superseded")]
    Stale {
        /// Task whose response was discarded.
        task: TaskId,
    },
}

impl FetchError {
    /// Returns true when the session should be dropped.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl From<HttpError> for FetchError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Unauthorized => Self::Unauthorized,
            HttpError::Decode(message) => Self::Malformed(message),
            other @ (HttpError::Status { .. } | HttpError::Transport(_) | HttpError::InvalidUrl(_)) => {
                Self::Network(other.to_string())
            }
        }
    }
}

/// Failure of a persisted key/value store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("Session storage I/O error: {0}")]
    Io(String),

    /// The stored data could not be parsed.
    #[error("Session storage is corrupt: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Failure of the sign-in flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The token exchange failed or returned no token.
    #[error("Token exchange failed: {payload}")]
    ExchangeFailed {
        /// Upstream body or error text.
        payload: String,
    },

    /// The code was exchanged before and no session is live.
    #[error("Authorization code was already used")]
    CodeAlreadyUsed,

    /// The token was issued but the workspace lookup failed.
    #[error("Workspace lookup failed: {0}")]
    TeamLookupFailed(FetchError),

    /// The token has no visible workspace.
    #[error("No workspace is available for this account")]
    NoWorkspace,

    /// Persisting or reading session data failed.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_errors_collapse_into_fetch_errors() {
        assert_eq!(FetchError::from(HttpError::Unauthorized), FetchError::Unauthorized);
        assert_eq!(
            FetchError::from(HttpError::Decode("eof".into())),
            FetchError::Malformed("eof".into())
        );
        let network = FetchError::from(HttpError::Status {
            status: 500,
            body: "boom".into(),
        });
        assert!(matches!(network, FetchError::Network(ref msg) if msg.contains("500")));
    }
}
