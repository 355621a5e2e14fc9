//! ELI5 streaming explainer
//!
//! Sends a topic and a complexity level to a text-generation endpoint and
//! renders the answer while it is still arriving.
//!
//! # Architecture
//!
//! - **Decoding**: raw body chunks are decoded incrementally, so characters
//!   split across chunks are never emitted malformed
//! - **Accumulation**: fragments fold into the running response and trigger a
//!   re-render after each one
//! - **Formatting**: a small inline markup subset is turned into escaped HTML
//! - **Control**: a UI state machine (idle → loading → success/error) with
//!   generation tokens so a resubmission supersedes a request still streaming
//!
//! # Modules
//!
//! - [`config`]: layered configuration (defaults, YAML, env, CLI)
//! - [`controller`]: request lifecycle and UI state machine
//! - [`error`]: error taxonomy
//! - [`llm`]: requests, payloads, transport, decoding and accumulation
//! - [`markup`]: inline markup to HTML
//! - [`session`]: endpoint configuration and in-flight tracking
//! - [`view`]: presentation seam

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod controller;
pub mod error;
pub mod llm;
pub mod markup;
pub mod session;
pub mod view;

pub use controller::{ControllerSettings, RequestController, RequestOutcome, UiState};
pub use error::{ErrorKind, ExplainError};
pub use session::{SessionConfig, SessionState};
pub use view::{ElementId, View};
