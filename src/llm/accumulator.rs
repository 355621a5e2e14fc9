//! Folding decoded fragments into the running response text.

/// Text received so far for one request.
///
/// Grows by append only; owned by the request that created it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamingResult {
    full_text: String,
    fragment_count: usize,
}

impl StreamingResult {
    /// Everything received so far.
    #[must_use]
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    /// Number of fragments appended.
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.fragment_count
    }

    /// Take ownership of the accumulated text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.full_text
    }
}

/// Appends fragments and re-renders after each one.
///
/// The render callback runs synchronously, once per fragment, in arrival
/// order. [`on_complete`](Self::on_complete) consumes the accumulator, so no
/// fragment can be delivered after completion.
pub struct ResponseAccumulator<R>
where
    R: FnMut(&str),
{
    result: StreamingResult,
    render: R,
}

impl<R> std::fmt::Debug for ResponseAccumulator<R>
where
    R: FnMut(&str),
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseAccumulator")
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

impl<R> ResponseAccumulator<R>
where
    R: FnMut(&str),
{
    /// Start an empty accumulator that renders through `render`.
    pub fn new(render: R) -> Self {
        Self {
            result: StreamingResult::default(),
            render,
        }
    }

    /// Append one fragment and render the updated full text.
    pub fn on_fragment(&mut self, fragment: &str) {
        self.result.full_text.push_str(fragment);
        self.result.fragment_count += 1;
        (self.render)(&self.result.full_text);
    }

    /// Text accumulated so far.
    #[must_use]
    pub fn result(&self) -> &StreamingResult {
        &self.result
    }

    /// Finish accumulation and hand back the result.
    #[must_use]
    pub fn on_complete(self) -> StreamingResult {
        self.result
    }
}
