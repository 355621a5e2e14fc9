//! End-to-end driver for one explanation request.
//!
//! The [`RequestController`] owns the UI state machine:
//!
//! ```text
//!            submit (valid)              stream ends
//!   Idle ─────────────────────▶ Loading ─────────────▶ Success
//!     ▲                          │  ▲ │ fragment          │
//!     │ (rejected submissions    │  └─┘                   │ submit
//!     │  leave the state alone)  │ error                  ▼
//!     │                          └──────────────────▶ Error ──▶ Loading
//! ```
//!
//! Each accepted submission takes a fresh [`Generation`] from the
//! [`SessionState`]. Renders and settlement happen only while that generation
//! is current, so a resubmission silently retires the request it supersedes:
//! its remaining fragments are never rendered and its stream is dropped at the
//! next fragment boundary.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{ErrorKind, ExplainError, TransportError};
use crate::llm::{
    ComplexityLevel, DEFAULT_MODEL, ExplanationRequest, ResponseAccumulator, TailPolicy, Transport,
    decode_stream, mask_key,
};
use crate::markup;
use crate::session::{Generation, SessionState};
use crate::view::{ElementId, View};

/// Visible state of the explanation panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum UiState {
    /// Nothing requested yet.
    Idle,
    /// A request at the given level is streaming.
    Loading(ComplexityLevel),
    /// The last request completed.
    Success,
    /// The last request failed with this message.
    Error(String),
}

/// Terminal value of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The full response text.
    Success(String),
    /// The request failed.
    Failure {
        /// Error category.
        kind: ErrorKind,
        /// Message shown to the user.
        message: String,
    },
    /// A newer submission took over before this one settled.
    Superseded,
}

impl RequestOutcome {
    fn failure(err: &ExplainError) -> Self {
        Self::Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Per-controller knobs derived from configuration.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Model identifier placed in the payload.
    pub model: String,
    /// Limit on each wait for headers or the next chunk; `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Handling of an incomplete character at end of stream.
    pub tail: TailPolicy,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            idle_timeout: Some(Duration::from_secs(120)),
            tail: TailPolicy::Drop,
        }
    }
}

impl From<&AppConfig> for ControllerSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.api.model.clone(),
            idle_timeout: config.stream.idle_timeout(),
            tail: TailPolicy::from_strict(config.stream.strict_decoding),
        }
    }
}

/// An accepted submission that has entered `Loading` but not yet streamed.
#[derive(Debug)]
pub struct PendingRequest {
    request: ExplanationRequest,
    generation: Generation,
    request_id: String,
    api_url: String,
    api_key: String,
}

impl PendingRequest {
    /// The validated request.
    #[must_use]
    pub fn request(&self) -> &ExplanationRequest {
        &self.request
    }

    /// Generation token owned by this submission.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// Drives explanation requests against a [`Transport`] and renders into a
/// [`View`].
///
/// Cloning shares the same session, view and state.
#[derive(Clone)]
pub struct RequestController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    session: SessionState,
    transport: Arc<dyn Transport>,
    view: Arc<dyn View>,
    settings: ControllerSettings,
    state: Mutex<UiState>,
}

impl std::fmt::Debug for RequestController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestController")
            .field("session", &self.inner.session)
            .field("settings", &self.inner.settings)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl RequestController {
    /// Create a controller in the `Idle` state.
    pub fn new(
        session: SessionState,
        transport: Arc<dyn Transport>,
        view: Arc<dyn View>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                session,
                transport,
                view,
                settings,
                state: Mutex::new(UiState::Idle),
            }),
        }
    }

    /// Current UI state.
    #[must_use]
    pub fn state(&self) -> UiState {
        self.lock_state().clone()
    }

    /// The session this controller reads configuration from.
    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.inner.session
    }

    /// Validate a submission and enter `Loading`.
    ///
    /// Runs synchronously: when this returns `Ok`, the state is already
    /// `Loading` and any earlier request has been superseded. A rejected
    /// submission shows its message on the error element but leaves the state
    /// and any in-flight request untouched.
    pub fn begin(&self, topic: &str, complexity: u8) -> Result<PendingRequest, ExplainError> {
        let request_id = Uuid::new_v4().to_string();

        let accepted = ExplanationRequest::new(topic, complexity).and_then(|request| {
            let config = self.inner.session.config();
            let api_key = config.api_key.ok_or(ExplainError::MissingApiKey)?;
            Ok((request, config.api_url, api_key))
        });

        let (request, api_url, api_key) = match accepted {
            Ok(parts) => parts,
            Err(err) => {
                tracing::info!(
                    name: "explain.request.rejected",
                    request_id = %request_id,
                    kind = ?err.kind(),
                    error = %err,
                    "Submission rejected"
                );
                self.inner.view.set_text(ElementId::Error, &err.to_string());
                self.inner.view.show(ElementId::Error);
                return Err(err);
            }
        };

        let generation = self.inner.session.begin_request();
        let level = request.complexity();

        tracing::info!(
            name: "explain.request.started",
            request_id = %request_id,
            generation = %generation,
            topic = %request.topic(),
            complexity = level.level(),
            api_url = %api_url,
            api_key = %mask_key(&api_key),
            "Starting explanation request"
        );

        self.inner.session.with_current(generation, || {
            *self.lock_state() = UiState::Loading(level);
            let view = &self.inner.view;
            view.set_text(ElementId::LoadingMessage, level.loading_message());
            view.set_text(ElementId::ResultTitle, &level.title());
            view.show(ElementId::Loading);
            view.hide(ElementId::Error);
            view.hide(ElementId::Results);
        });

        Ok(PendingRequest {
            request,
            generation,
            request_id,
            api_url,
            api_key,
        })
    }

    /// Stream an accepted request to completion and settle the UI state.
    pub async fn run(&self, pending: PendingRequest) -> RequestOutcome {
        let result = self.stream(&pending).await;
        self.settle(&pending, result)
    }

    /// [`begin`](Self::begin) followed by [`run`](Self::run).
    ///
    /// Rejected submissions come back as a `Failure` outcome.
    pub async fn submit(&self, topic: &str, complexity: u8) -> RequestOutcome {
        match self.begin(topic, complexity) {
            Ok(pending) => self.run(pending).await,
            Err(err) => RequestOutcome::failure(&err),
        }
    }

    /// Fetch and render the response. `Ok(None)` means superseded.
    async fn stream(&self, pending: &PendingRequest) -> Result<Option<String>, ExplainError> {
        let inner = &self.inner;
        let generation = pending.generation;
        let payload = pending
            .request
            .payload(&inner.settings.model, &pending.api_key);

        let response = self
            .idle(inner.transport.send(&pending.api_url, &payload))
            .await??;

        if !inner.session.is_current(generation) {
            return Ok(None);
        }

        if !response.is_success() {
            let status = response.status;
            let body = self.idle(response.text()).await.unwrap_or_default();
            tracing::warn!(
                name: "explain.response.status",
                request_id = %pending.request_id,
                status = status,
                body = %body,
                "Endpoint returned an error status"
            );
            return Err(ExplainError::from_status(status, body));
        }

        tracing::debug!(
            name: "explain.stream.opened",
            request_id = %pending.request_id,
            status = response.status,
            "Streaming response"
        );

        let fragments = decode_stream(response.body, inner.settings.tail);
        futures::pin_mut!(fragments);

        let mut accumulator = ResponseAccumulator::new(|text: &str| {
            let html = markup::format(text);
            inner.session.with_current(generation, || {
                inner.view.set_html(ElementId::ResultContent, &html);
            });
        });

        while let Some(fragment) = self.idle(fragments.next()).await? {
            let fragment = fragment?;
            if !inner.session.is_current(generation) {
                tracing::debug!(
                    name: "explain.stream.superseded",
                    request_id = %pending.request_id,
                    generation = %generation,
                    received = accumulator.result().fragment_count(),
                    "Dropping superseded stream"
                );
                return Ok(None);
            }
            accumulator.on_fragment(&fragment);
            tracing::trace!(
                request_id = %pending.request_id,
                fragment = accumulator.result().fragment_count(),
                length = fragment.len(),
                "Fragment rendered"
            );
        }

        let result = accumulator.on_complete();
        tracing::debug!(
            name: "explain.stream.complete",
            request_id = %pending.request_id,
            fragments = result.fragment_count(),
            length = result.full_text().len(),
            "Stream complete"
        );
        Ok(Some(result.into_text()))
    }

    fn settle(
        &self,
        pending: &PendingRequest,
        result: Result<Option<String>, ExplainError>,
    ) -> RequestOutcome {
        let inner = &self.inner;
        let view = &inner.view;
        let level = pending.request.complexity();

        let settled = match result {
            Ok(Some(text)) => inner.session.settle(pending.generation, || {
                view.set_html(ElementId::ResultContent, &markup::format(&text));
                view.set_text(ElementId::ResultTitle, &level.title());
                view.hide(ElementId::Loading);
                view.hide(ElementId::Error);
                view.show(ElementId::Results);
                *self.lock_state() = UiState::Success;
                tracing::info!(
                    name: "explain.request.succeeded",
                    request_id = %pending.request_id,
                    length = text.len(),
                    "Explanation complete"
                );
                RequestOutcome::Success(text)
            }),
            Ok(None) => None,
            Err(err) => inner.session.settle(pending.generation, || {
                let message = err.to_string();
                view.set_text(ElementId::Error, &message);
                view.show(ElementId::Error);
                view.hide(ElementId::Loading);
                *self.lock_state() = UiState::Error(message);
                tracing::error!(
                    name: "explain.request.failed",
                    request_id = %pending.request_id,
                    kind = ?err.kind(),
                    error = %err,
                    "Explanation request failed"
                );
                RequestOutcome::failure(&err)
            }),
        };

        settled.unwrap_or_else(|| {
            tracing::debug!(
                name: "explain.request.superseded",
                request_id = %pending.request_id,
                generation = %pending.generation,
                "Request superseded before settling"
            );
            RequestOutcome::Superseded
        })
    }

    /// Bound one suspension point by the idle timeout.
    async fn idle<F: Future>(&self, fut: F) -> Result<F::Output, TransportError> {
        match self.inner.settings.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_elapsed| TransportError::Timeout(limit.as_secs())),
            None => Ok(fut.await),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, UiState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ExplainPayload, TransportResponse};
    use crate::session::SessionConfig;
    use crate::view::RecordingView;
    use bytes::Bytes;

    struct FixedTransport {
        status: u16,
        chunks: Vec<&'static str>,
    }

    #[async_trait::async_trait]
    impl Transport for FixedTransport {
        async fn send(
            &self,
            _url: &str,
            _payload: &ExplainPayload,
        ) -> Result<TransportResponse, TransportError> {
            let chunks: Vec<Result<Bytes, TransportError>> = self
                .chunks
                .iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                .collect();
            Ok(TransportResponse {
                status: self.status,
                body: Box::pin(futures::stream::iter(chunks)),
            })
        }
    }

    fn controller(
        status: u16,
        chunks: Vec<&'static str>,
        key: Option<&str>,
    ) -> (RequestController, Arc<RecordingView>) {
        let view = Arc::new(RecordingView::new());
        let session = SessionState::new(SessionConfig::new(
            "http://localhost:8000/api/chat",
            key.map(ToString::to_string),
        ));
        let controller = RequestController::new(
            session,
            Arc::new(FixedTransport { status, chunks }),
            Arc::clone(&view) as Arc<dyn View>,
            ControllerSettings::default(),
        );
        (controller, view)
    }

    #[test]
    fn test_begin_enters_loading_synchronously() {
        let (controller, view) = controller(200, vec!["hi"], Some("sk-test"));
        assert_eq!(controller.state(), UiState::Idle);

        let pending = controller.begin("  volcanoes ", 2).unwrap();
        assert_eq!(pending.request().topic(), "volcanoes");
        assert_eq!(
            controller.state(),
            UiState::Loading(ComplexityLevel::Beginner)
        );
        assert!(view.is_visible(ElementId::Loading));
        assert_eq!(
            view.content(ElementId::LoadingMessage).as_deref(),
            Some("Breaking it down simply... 📚")
        );
        assert_eq!(controller.session().in_flight(), Some(pending.generation()));
    }

    #[test]
    fn test_empty_topic_stays_idle() {
        let (controller, view) = controller(200, vec![], Some("sk-test"));
        let err = controller.begin("   ", 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(controller.state(), UiState::Idle);
        assert!(view.is_visible(ElementId::Error));
        assert_eq!(controller.session().in_flight(), None);
    }

    #[test]
    fn test_missing_key_stays_idle() {
        let (controller, _view) = controller(200, vec![], None);
        let err = controller.begin("tides", 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(controller.state(), UiState::Idle);
    }

    #[tokio::test]
    async fn test_success_renders_each_fragment() {
        let (controller, view) = controller(200, vec!["**Gra", "vity** pulls", "\n\ndown"], Some("k"));
        let outcome = controller.submit("gravity", 1).await;

        assert_eq!(
            outcome,
            RequestOutcome::Success("**Gravity** pulls\n\ndown".to_string())
        );
        assert_eq!(controller.state(), UiState::Success);
        assert_eq!(
            view.html_history(ElementId::ResultContent),
            vec![
                "<p><em></em>Gra</p>",
                "<p><strong>Gravity</strong> pulls</p>",
                "<p><strong>Gravity</strong> pulls</p><p>down</p>",
                "<p><strong>Gravity</strong> pulls</p><p>down</p>",
            ]
        );
        assert!(view.is_visible(ElementId::Results));
        assert!(!view.is_visible(ElementId::Loading));
        assert_eq!(
            view.content(ElementId::ResultTitle).as_deref(),
            Some("ELI5 (Explain Like I'm 5) Explanation")
        );
        assert_eq!(controller.session().in_flight(), None);
    }

    #[tokio::test]
    async fn test_not_implemented_status() {
        let (controller, view) = controller(501, vec!["unused"], Some("k"));
        let outcome = controller.submit("anything", 3).await;

        let RequestOutcome::Failure { kind, message } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(kind, ErrorKind::TransportStatus);
        assert!(message.starts_with("API endpoint not implemented"));
        assert_eq!(controller.state(), UiState::Error(message.clone()));
        assert_eq!(view.content(ElementId::Error), Some(message));
        assert!(!view.is_visible(ElementId::Loading));
    }

    #[tokio::test]
    async fn test_generic_status_embeds_body() {
        let (controller, _view) = controller(502, vec!["bad ", "gateway"], Some("k"));
        let outcome = controller.submit("anything", 3).await;
        assert_eq!(
            outcome,
            RequestOutcome::Failure {
                kind: ErrorKind::TransportStatus,
                message: "HTTP error! status: 502 - bad gateway".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_resubmission_after_error() {
        let (controller, _view) = controller(500, vec![], Some("k"));
        assert!(matches!(
            controller.submit("a", 1).await,
            RequestOutcome::Failure { .. }
        ));
        let pending = controller.begin("b", 5).unwrap();
        assert_eq!(controller.state(), UiState::Loading(ComplexityLevel::Expert));
        drop(pending);
    }
}
