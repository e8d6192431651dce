//! HTTP seam between the executor and the network.

use std::time::Duration;

use async_trait::async_trait;
use lib_core::FailureKind;
use reqwest::Client;
use thiserror::Error;
use tracing::trace;

use super::request::ApiRequest;

/// Status and body of a completed HTTP exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// The exchange did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TransportError::Timeout(_) => FailureKind::Timeout,
            TransportError::Connect(_) | TransportError::Other(_) => {
                FailureKind::NetworkUnreachable
            }
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Performs one HTTP exchange. Retry, timeout and caching live above this.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<RawResponse, TransportError>;
}

/// [`HttpTransport`] over a shared `reqwest` connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Client for `base_url`, giving up on connection setup after `connect_timeout`.
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<RawResponse, TransportError> {
        let url = self.url_for(&request.path);
        trace!(method = %request.method, url = %url, "Sending HTTP request");

        let mut builder = self.client.request(request.method.as_reqwest(), &url);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(RawResponse { status, body })
    }
}
