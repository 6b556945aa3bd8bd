//! HTTP transport
//!
//! The adapter talks to the service through the [`Transport`] trait so that
//! the orchestration logic can be driven by a scripted transport in tests.
//! [`HttpTransport`] is the reqwest implementation.

use reqwest::Client;
use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;

/// HTTP method of a managed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A 2xx response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        TransportResponse {
            status: 200,
            body: body.into(),
        }
    }
}

/// Issues form requests. Non-2xx statuses are errors.
pub trait Transport: Send + Sync {
    fn post(
        &self,
        url: &str,
        form: &[(String, String)],
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;

    fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()?;
        Ok(HttpTransport { client })
    }

    /// Wrap an existing client (shared connection pool, custom TLS, ...)
    pub fn with_client(client: Client) -> Self {
        HttpTransport { client }
    }

    async fn finish(response: reqwest::Response) -> Result<TransportResponse, TransportError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("request failed");
            tracing::warn!(status = status.as_u16(), "http_request_failed");
            return Err(TransportError::new(status.as_u16(), reason));
        }
        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }
}

impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        form: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        tracing::trace!(url, fields = form.len(), "http_post");
        let response = self.client.post(url).form(form).send().await?;
        Self::finish(response).await
    }

    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        tracing::trace!(url, "http_get");
        let response = self.client.get(url).query(query).send().await?;
        Self::finish(response).await
    }
}
