//! Error types for the explanation pipeline.

use thiserror::Error;

/// Failure raised by a [`Transport`](crate::llm::Transport) implementation.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The connection could not be established or broke mid-body.
    #[error("Network error: {0}")]
    Connection(String),

    /// A suspension point waited longer than the configured idle timeout.
    #[error("Request timed out after {0}s without data")]
    Timeout(u64),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

/// Failure raised while decoding a response body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The body ended in the middle of a multi-byte sequence.
    #[error("Response ended with {dropped} undecodable trailing byte(s)")]
    Truncated {
        /// Number of bytes left in the decoder buffer.
        dropped: usize,
    },
}

/// Discriminant of [`ExplainError`], used by outcomes and the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Empty topic.
    Validation,
    /// Missing credential.
    Configuration,
    /// Non-2xx HTTP status.
    TransportStatus,
    /// Body ended mid-sequence (strict decoding only).
    DecodeTruncation,
    /// Network failure.
    TransportConnection,
    /// Idle timeout at a suspension point.
    Timeout,
}

/// Errors that terminate one explanation request.
///
/// The `Display` output of each variant is the message shown to the user.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// The topic was empty after trimming.
    #[error("Please enter a topic to explain")]
    EmptyTopic,

    /// The complexity level was outside `1..=5`.
    #[error("Complexity must be between 1 and 5 (got {0})")]
    InvalidComplexity(u8),

    /// No API key is configured.
    #[error("Please configure your API key before requesting an explanation")]
    MissingApiKey,

    /// The endpoint answered 501.
    #[error("API endpoint not implemented. Please check your backend API configuration.")]
    NotImplemented,

    /// The endpoint answered with another non-2xx status.
    #[error("HTTP error! status: {status} - {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Strict decoding rejected a truncated body.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ExplainError {
    /// Map an HTTP status and body to the matching error.
    #[must_use]
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 501 {
            Self::NotImplemented
        } else {
            Self::Status { status, body }
        }
    }

    /// The taxonomy bucket this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyTopic | Self::InvalidComplexity(_) => ErrorKind::Validation,
            Self::MissingApiKey => ErrorKind::Configuration,
            Self::NotImplemented | Self::Status { .. } => ErrorKind::TransportStatus,
            Self::Decode(_) => ErrorKind::DecodeTruncation,
            Self::Transport(TransportError::Timeout(_)) => ErrorKind::Timeout,
            Self::Transport(_) => ErrorKind::TransportConnection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_501_is_distinct() {
        let err = ExplainError::from_status(501, "nope".to_string());
        assert!(matches!(err, ExplainError::NotImplemented));
        assert!(err.to_string().contains("not implemented"));
        assert_eq!(err.kind(), ErrorKind::TransportStatus);
    }

    #[test]
    fn test_generic_status_message() {
        let err = ExplainError::from_status(500, "boom".to_string());
        assert_eq!(err.to_string(), "HTTP error! status: 500 - boom");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(ExplainError::EmptyTopic.kind(), ErrorKind::Validation);
        assert_eq!(ExplainError::MissingApiKey.kind(), ErrorKind::Configuration);
        assert_eq!(
            ExplainError::from(TransportError::Timeout(5)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            ExplainError::from(DecodeError::Truncated { dropped: 2 }).kind(),
            ErrorKind::DecodeTruncation
        );
    }
}
