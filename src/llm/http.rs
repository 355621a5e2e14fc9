//! `reqwest`-backed [`Transport`].

use std::time::Duration;

use futures::StreamExt;

use crate::error::TransportError;

use super::{ExplainPayload, Transport, TransportResponse};

/// HTTP transport posting JSON and streaming the response body.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    /// Create a transport with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Create a transport whose connection attempts give up after `timeout`.
    ///
    /// Only connecting is bounded here; waits for headers and body chunks are
    /// bounded by the controller's idle timeout.
    #[must_use]
    pub fn with_connect_timeout(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        url: &str,
        payload: &ExplainPayload,
    ) -> Result<TransportResponse, TransportError> {
        tracing::debug!(
            name: "transport.request.sending",
            url = %url,
            model = %payload.model,
            "Posting explanation request"
        );

        let resp = self.http.post(url).json(payload).send().await?;
        let status = resp.status().as_u16();

        tracing::debug!(
            name: "transport.response.headers",
            status = status,
            "Response headers received"
        );

        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from));

        Ok(TransportResponse {
            status,
            body: Box::pin(body),
        })
    }
}
