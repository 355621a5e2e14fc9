//! Presentation seam.
//!
//! The controller never renders directly; it drives a [`View`] through four
//! primitive operations keyed by [`ElementId`]. Front ends implement the trait
//! (the `eli5` binary renders to a terminal); [`RecordingView`] keeps a log of
//! every call for headless tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

/// Elements the controller updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementId {
    /// Loading indicator container.
    Loading,
    /// Text inside the loading indicator.
    LoadingMessage,
    /// Heading above the explanation.
    ResultTitle,
    /// Formatted explanation body.
    ResultContent,
    /// Container around title and content.
    Results,
    /// Error banner.
    Error,
}

/// Display surface driven by the controller.
///
/// Calls arrive one at a time from whichever request currently owns the
/// render target.
pub trait View: Send + Sync {
    /// Replace an element's text content.
    fn set_text(&self, id: ElementId, text: &str);

    /// Replace an element's content with formatter HTML.
    fn set_html(&self, id: ElementId, html: &str);

    /// Make an element visible.
    fn show(&self, id: ElementId);

    /// Hide an element.
    fn hide(&self, id: ElementId);
}

/// One recorded [`View`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ViewCall {
    /// [`View::set_text`].
    SetText {
        /// Target element.
        id: ElementId,
        /// Text written.
        text: String,
    },
    /// [`View::set_html`].
    SetHtml {
        /// Target element.
        id: ElementId,
        /// HTML written.
        html: String,
    },
    /// [`View::show`].
    Show {
        /// Element made visible.
        id: ElementId,
    },
    /// [`View::hide`].
    Hide {
        /// Element hidden.
        id: ElementId,
    },
}

/// In-memory [`View`] that records every call and tracks element state.
#[derive(Debug, Default)]
pub struct RecordingView {
    inner: Mutex<Recorded>,
}

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<ViewCall>,
    content: HashMap<ElementId, String>,
    visible: HashMap<ElementId, bool>,
}

impl RecordingView {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ViewCall> {
        self.lock().calls.clone()
    }

    /// Last text or HTML written to `id`.
    #[must_use]
    pub fn content(&self, id: ElementId) -> Option<String> {
        self.lock().content.get(&id).cloned()
    }

    /// Whether `id` was last shown (elements start hidden).
    #[must_use]
    pub fn is_visible(&self, id: ElementId) -> bool {
        self.lock().visible.get(&id).copied().unwrap_or(false)
    }

    /// Every HTML value written to `id`, in order.
    #[must_use]
    pub fn html_history(&self, id: ElementId) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ViewCall::SetHtml { id: target, html } if *target == id => Some(html.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl View for RecordingView {
    fn set_text(&self, id: ElementId, text: &str) {
        let mut rec = self.lock();
        rec.content.insert(id, text.to_string());
        rec.calls.push(ViewCall::SetText {
            id,
            text: text.to_string(),
        });
    }

    fn set_html(&self, id: ElementId, html: &str) {
        let mut rec = self.lock();
        rec.content.insert(id, html.to_string());
        rec.calls.push(ViewCall::SetHtml {
            id,
            html: html.to_string(),
        });
    }

    fn show(&self, id: ElementId) {
        let mut rec = self.lock();
        rec.visible.insert(id, true);
        rec.calls.push(ViewCall::Show { id });
    }

    fn hide(&self, id: ElementId) {
        let mut rec = self.lock();
        rec.visible.insert(id, false);
        rec.calls.push(ViewCall::Hide { id });
    }
}
