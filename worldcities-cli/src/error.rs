//! Client error taxonomy

use thiserror::Error;

/// Result type alias for API calls
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failure of an API call
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an error status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Message from the error body, or the status reason
        message: String,
    },

    /// The response body was not what the endpoint promises
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status carried by the error, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Decode(_) => None,
        }
    }
}
