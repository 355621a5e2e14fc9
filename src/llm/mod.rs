//! Explanation requests and the streaming text-generation transport.
//!
//! This module holds everything between a validated user submission and the
//! text fragments that come back:
//!
//! - [`ComplexityLevel`]: the five explanation presets and their prompts
//! - [`ExplanationRequest`] / [`ExplainPayload`]: what is sent upstream
//! - [`Transport`]: the seam to the HTTP layer, with [`HttpTransport`] as the
//!   production implementation
//! - [`decoder`]: incremental UTF-8 decoding of the response body
//! - [`accumulator`]: folding fragments into the running response
//!
//! # Example
//!
//! ```rust
//! use eli5_stream::llm::{ComplexityLevel, ExplanationRequest};
//!
//! let request = ExplanationRequest::new("  black holes ", 1).unwrap();
//! assert_eq!(request.topic(), "black holes");
//! assert_eq!(request.complexity(), ComplexityLevel::Eli5);
//! assert_eq!(request.user_message(), "Please explain: black holes");
//! ```

pub mod accumulator;
pub mod decoder;
pub mod http;

pub use accumulator::{ResponseAccumulator, StreamingResult};
pub use decoder::{TailPolicy, Utf8Decoder, decode_stream};
pub use http::HttpTransport;

use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::error::{ExplainError, TransportError};

/// Model identifier sent with every request unless configured otherwise.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Explanation depth presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
pub enum ComplexityLevel {
    /// Level 1.
    Eli5 = 1,
    /// Level 2.
    Beginner = 2,
    /// Level 3.
    Intermediate = 3,
    /// Level 4.
    Advanced = 4,
    /// Level 5.
    Expert = 5,
}

impl ComplexityLevel {
    /// All levels, lowest first.
    pub const ALL: [Self; 5] = [
        Self::Eli5,
        Self::Beginner,
        Self::Intermediate,
        Self::Advanced,
        Self::Expert,
    ];

    /// Look up a level by its number.
    #[must_use]
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Eli5),
            2 => Some(Self::Beginner),
            3 => Some(Self::Intermediate),
            4 => Some(Self::Advanced),
            5 => Some(Self::Expert),
            _ => None,
        }
    }

    /// The level number, `1..=5`.
    #[must_use]
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Display label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Eli5 => "ELI5 (Explain Like I'm 5)",
            Self::Beginner => "Beginner",
            Self::Intermediate => "Intermediate",
            Self::Advanced => "Advanced",
            Self::Expert => "Expert",
        }
    }

    /// Message shown while the explanation is loading.
    #[must_use]
    pub fn loading_message(self) -> &'static str {
        match self {
            Self::Eli5 => "Thinking like a 5-year-old... 🤔",
            Self::Beginner => "Breaking it down simply... 📚",
            Self::Intermediate => "Building up the concepts... 🧱",
            Self::Advanced => "Adding technical details... ⚙️",
            Self::Expert => "Going deep into the topic... 🔬",
        }
    }

    /// Result heading, e.g. `"Beginner Explanation"`.
    #[must_use]
    pub fn title(self) -> String {
        format!("{} Explanation", self.label())
    }

    /// Instruction template sent as the developer message.
    #[must_use]
    pub fn developer_message(self) -> String {
        format!(
            "You are a teacher. Explain the topic as if teaching someone at a {} level.\n\
             \n\
             Please structure your response with:\n\
             - A simple, clear explanation\n\
             - Key concepts broken down\n\
             - Real-world examples or analogies\n\
             - Visual descriptions that could be drawn\n\
             \n\
             Make it engaging and easy to understand for the specified complexity level.",
            self.label()
        )
    }
}

impl From<ComplexityLevel> for u8 {
    fn from(level: ComplexityLevel) -> Self {
        level.level()
    }
}

impl std::fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A validated explanation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplanationRequest {
    topic: String,
    complexity: ComplexityLevel,
}

impl ExplanationRequest {
    /// Validate and build a request.
    ///
    /// The topic is trimmed and must not be empty; `complexity` must be in
    /// `1..=5`.
    pub fn new(topic: &str, complexity: u8) -> Result<Self, ExplainError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ExplainError::EmptyTopic);
        }
        let complexity = ComplexityLevel::from_level(complexity)
            .ok_or(ExplainError::InvalidComplexity(complexity))?;
        Ok(Self {
            topic: topic.to_string(),
            complexity,
        })
    }

    /// The trimmed topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Requested depth.
    #[must_use]
    pub fn complexity(&self) -> ComplexityLevel {
        self.complexity
    }

    /// The user turn sent upstream.
    #[must_use]
    pub fn user_message(&self) -> String {
        format!("Please explain: {}", self.topic)
    }

    /// Build the wire payload for this request.
    #[must_use]
    pub fn payload(&self, model: &str, api_key: &str) -> ExplainPayload {
        ExplainPayload {
            developer_message: self.complexity.developer_message(),
            user_message: self.user_message(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

/// JSON body posted to the explanation endpoint.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ExplainPayload {
    /// Per-complexity instruction template.
    pub developer_message: String,
    /// `"Please explain: " + topic`.
    pub user_message: String,
    /// Model identifier.
    pub model: String,
    /// Credential forwarded to the backend.
    pub api_key: String,
}

impl std::fmt::Debug for ExplainPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplainPayload")
            .field("developer_message", &self.developer_message)
            .field("user_message", &self.user_message)
            .field("model", &self.model)
            .field("api_key", &mask_key(&self.api_key))
            .finish()
    }
}

/// Shorten a credential for logs.
///
/// Keeps at most a quarter of the key, capped at ten characters, followed by
/// an ellipsis. Short keys therefore never appear whole.
#[must_use]
pub fn mask_key(key: &str) -> String {
    let visible = (key.chars().count() / 4).min(10);
    let prefix: String = key.chars().take(visible).collect();
    format!("{prefix}...")
}

/// Body of a transport response, as a stream of raw chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Status and streamed body of one transport response.
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: ByteStream,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl TransportResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drain the body into a string, replacing invalid UTF-8.
    ///
    /// Used for error bodies; a read failure keeps whatever arrived before it.
    pub async fn text(self) -> String {
        let mut raw = Vec::new();
        let mut body = self.body;
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => raw.extend_from_slice(&bytes),
                Err(e) => {
                    tracing::debug!(error = %e, "Error body read interrupted");
                    break;
                }
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }
}

/// Seam to the HTTP layer.
///
/// Implementations send the payload once and return as soon as the response
/// status is known; the body is consumed lazily by the caller.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Post `payload` to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if no response could be obtained.
    async fn send(
        &self,
        url: &str,
        payload: &ExplainPayload,
    ) -> Result<TransportResponse, TransportError>;
}
