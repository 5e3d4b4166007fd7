//! Raw gateway to the PCC server.
//!
//! Everything above this layer talks in terms of
//! `call(method, endpoint, body) -> (status, body)`; the reqwest-backed
//! [`HttpGateway`] is the production implementation and tests plug in their
//! own.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use crate::error::ApiError;

/// HTTP methods the server API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Status and raw body of one gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: Bytes,
}

impl GatewayResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Body as text, for error reporting.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport to the server.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn call(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Bytes>,
    ) -> Result<GatewayResponse, ApiError>;
}

/// Connection settings for [`HttpGateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL, e.g. `https://10.0.0.5:9999`.
    pub base_url: String,

    /// Bearer token.
    pub token: Option<String>,

    /// Accept self-signed server certificates.
    pub insecure_tls: bool,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            insecure_tls: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// reqwest-backed gateway.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ApiError::Precondition("invalid token format".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(config.insecure_tls)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn call(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Bytes>,
    ) -> Result<GatewayResponse, ApiError> {
        let url = self.url(endpoint);
        debug!(method = %method, url = %url, "Gateway call");

        let mut request = self.client.request(method.into(), &url);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(GatewayResponse { status, body })
    }
}
