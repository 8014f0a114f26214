//! Error types for medfeed-client

use std::time::Duration;
use thiserror::Error;

/// Result type for backend calls and pipeline fetches
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Backend call failures
///
/// Every variant is a transport/protocol failure from the pipeline's point of
/// view except `Config`, which is raised before any request is sent.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection, DNS or TLS failure
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the configured bound
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Backend answered with a non-success status
    #[error("API error {0}: {1}")]
    Status(u16, String),

    /// Response body was not the expected JSON shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Client could not be constructed from configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested article is not part of the current feed
    #[error("Article not in feed: {0}")]
    NotInFeed(String),
}

impl ClientError {
    /// True for failures caused by the network or the backend
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Network(_)
                | ClientError::Timeout(_)
                | ClientError::Status(..)
                | ClientError::Parse(_)
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Parse(err.to_string())
        } else if err.is_timeout() {
            ClientError::Network(format!("timed out: {}", err))
        } else if let Some(status) = err.status() {
            ClientError::Status(status.as_u16(), err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<medfeed_common::Error> for ClientError {
    fn from(err: medfeed_common::Error) -> Self {
        ClientError::Config(err.to_string())
    }
}
