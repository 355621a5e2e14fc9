//! Endpoint configuration and in-flight request tracking.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Endpoint and credential used for the next submission.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Explanation endpoint.
    pub api_url: String,
    /// Credential forwarded in the payload; `None` blocks submission.
    pub api_key: Option<String>,
}

impl SessionConfig {
    /// Build a config, treating a blank key as absent.
    #[must_use]
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_deref().map(crate::llm::mask_key))
            .finish()
    }
}

/// Token identifying one submission.
///
/// Only the token returned by the latest [`SessionState::begin_request`] is
/// current; every older token is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Tracker {
    latest: u64,
    in_flight: Option<Generation>,
}

/// Shared session context.
///
/// Holds the current [`SessionConfig`] and the generation of the request
/// that owns the render target. Cloning shares the same state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    inner: Arc<SessionInner>,
}

#[derive(Debug, Default)]
struct SessionInner {
    config: RwLock<SessionConfig>,
    tracker: Mutex<Tracker>,
}

impl SessionState {
    /// Create a session with the given configuration.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config: RwLock::new(config),
                tracker: Mutex::new(Tracker::default()),
            }),
        }
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> SessionConfig {
        self.inner
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the configuration used by later submissions.
    pub fn configure(&self, config: SessionConfig) {
        let mut guard = self
            .inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = config;
    }

    /// Mint a new generation and make it the in-flight request.
    ///
    /// Any previously issued generation becomes stale.
    pub fn begin_request(&self) -> Generation {
        let mut tracker = self.tracker();
        tracker.latest += 1;
        let generation = Generation(tracker.latest);
        tracker.in_flight = Some(generation);
        generation
    }

    /// Whether `generation` is the latest submission.
    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.tracker().latest == generation.0
    }

    /// The generation of the request still running, if any.
    #[must_use]
    pub fn in_flight(&self) -> Option<Generation> {
        self.tracker().in_flight
    }

    /// Run `f` only if `generation` is current.
    ///
    /// `f` runs with the tracker locked, so no newer submission can begin
    /// while it executes. Returns `None` without calling `f` for a stale
    /// generation. `f` must not call back into this session.
    pub fn with_current<T>(&self, generation: Generation, f: impl FnOnce() -> T) -> Option<T> {
        let tracker = self.tracker();
        (tracker.latest == generation.0).then(f)
    }

    /// Mark `generation` as settled and run `f` under the same lock.
    ///
    /// Returns `None` (and leaves the tracker untouched) when `generation`
    /// was superseded.
    pub fn settle<T>(&self, generation: Generation, f: impl FnOnce() -> T) -> Option<T> {
        let mut tracker = self.tracker();
        if tracker.latest != generation.0 {
            return None;
        }
        tracker.in_flight = None;
        Some(f())
    }

    fn tracker(&self) -> std::sync::MutexGuard<'_, Tracker> {
        self.inner
            .tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_key_is_absent() {
        let config = SessionConfig::new("http://localhost:8000/api/chat", Some("  ".to_string()));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_debug_masks_key() {
        let config = SessionConfig::new("u", Some("sk-1234567890abcdef".to_string()));
        let debug = format!("{config:?}");
        assert!(debug.contains("\"sk-1...\""));
        assert!(!debug.contains("abcdef"));

        let config = SessionConfig::new("u", Some("sk-secret9".to_string()));
        assert!(!format!("{config:?}").contains("sk-secret9"));
    }

    #[test]
    fn test_generations_supersede() {
        let session = SessionState::default();
        assert_eq!(session.in_flight(), None);

        let first = session.begin_request();
        assert!(session.is_current(first));

        let second = session.begin_request();
        assert!(second > first);
        assert!(!session.is_current(first));
        assert!(session.is_current(second));
        assert_eq!(session.in_flight(), Some(second));
    }

    #[test]
    fn test_with_current_skips_stale() {
        let session = SessionState::default();
        let stale = session.begin_request();
        let current = session.begin_request();

        assert_eq!(session.with_current(stale, || 1), None);
        assert_eq!(session.with_current(current, || 2), Some(2));
    }

    #[test]
    fn test_settle_only_clears_current() {
        let session = SessionState::default();
        let stale = session.begin_request();
        let current = session.begin_request();

        assert_eq!(session.settle(stale, || ()), None);
        assert_eq!(session.in_flight(), Some(current));

        assert_eq!(session.settle(current, || ()), Some(()));
        assert_eq!(session.in_flight(), None);
        assert!(session.is_current(current));
    }

    #[test]
    fn test_configure_replaces_config() {
        let session = SessionState::new(SessionConfig::new("a", None));
        session.configure(SessionConfig::new("b", Some("key".to_string())));
        let config = session.config();
        assert_eq!(config.api_url, "b");
        assert_eq!(config.api_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_clones_share_state() {
        let session = SessionState::default();
        let handle = session.clone();
        let generation = session.begin_request();
        assert!(handle.is_current(generation));
    }
}
