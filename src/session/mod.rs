//! Session context shared by submissions.
//!
//! A [`SessionState`] holds the endpoint configuration and the generation
//! token of the request that currently owns the render target. Each
//! submission mints a new [`Generation`]; callbacks carrying an older one are
//! dropped, which is how a resubmission supersedes a request still streaming.
//!
//! # Example
//!
//! ```rust
//! use eli5_stream::session::{SessionConfig, SessionState};
//!
//! let session = SessionState::new(SessionConfig::new(
//!     "http://localhost:8000/api/chat",
//!     Some("sk-test".to_string()),
//! ));
//! let first = session.begin_request();
//! let second = session.begin_request();
//! assert!(!session.is_current(first));
//! assert!(session.is_current(second));
//! ```

mod state;

pub use state::{Generation, SessionConfig, SessionState};
