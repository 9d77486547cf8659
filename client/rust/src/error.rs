/// Error types for the room chat client.
/// Every variant is recoverable at the session level; none is fatal to the process.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Connect or reconnect failure on the realtime channel
    #[error("Connection error: {0}")]
    Connection(String),

    /// Media upload failed; no message is composed for it
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// Blank text submission. Callers drop it without telling the user.
    #[error("Empty submission")]
    EmptySubmission,

    #[error("Server error: {0}")]
    Server(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("State error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Whether the error should be shown to the user at all
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, ClientError::EmptySubmission)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::UploadFailed("server returned 500".to_string());
        assert!(err.to_string().contains("Upload failed"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let client_err: ClientError = io_err.into();
        assert!(client_err.to_string().contains("IO error"));
    }

    #[test]
    fn test_empty_submission_is_silent() {
        assert!(!ClientError::EmptySubmission.is_user_visible());
        assert!(ClientError::Connection("refused".to_string()).is_user_visible());
    }
}
