//! Typed PCC API client on top of a [`Gateway`].

use std::sync::Arc;

use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::ApiError;
use crate::gateway::{Gateway, GatewayConfig, HttpGateway, Method};

/// Response wrapper the server puts around every payload.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    message: String,
    #[serde(default)]
    error: String,
}

/// API client for the PCC server.
#[derive(Clone)]
pub struct PccClient {
    gateway: Arc<dyn Gateway>,
}

impl std::fmt::Debug for PccClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PccClient").finish_non_exhaustive()
    }
}

impl PccClient {
    pub fn new(gateway: impl Gateway + 'static) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }

    /// Client over HTTPS using [`HttpGateway`].
    pub fn connect(config: &GatewayConfig) -> Result<Self, ApiError> {
        Ok(Self::new(HttpGateway::new(config)?))
    }

    /// Issue one call and unwrap the envelope's `data`.
    ///
    /// Anything other than status 200, at the HTTP level or in the
    /// envelope, becomes [`ApiError::Status`] carrying the raw body.
    async fn call(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Bytes>,
    ) -> Result<serde_json::Value, ApiError> {
        let response = self.gateway.call(method, endpoint, body).await?;

        if !response.is_ok() {
            let body = response.text();
            error!(method = %method, endpoint, status = response.status, body = %body, "Request failed");
            return Err(ApiError::Status {
                method: method.as_str(),
                endpoint: endpoint.to_string(),
                status: response.status,
                body,
            });
        }

        if response.body.is_empty() {
            return Ok(serde_json::Value::Null);
        }

        let envelope: Envelope =
            serde_json::from_slice(&response.body).map_err(|source| ApiError::Decode {
                endpoint: endpoint.to_string(),
                source,
            })?;

        match envelope.status {
            Some(200) | None => Ok(envelope.data),
            Some(status) => {
                let detail = if envelope.error.is_empty() {
                    envelope.message
                } else {
                    envelope.error
                };
                error!(method = %method, endpoint, status, detail = %detail, "Request rejected");
                Err(ApiError::Status {
                    method: method.as_str(),
                    endpoint: endpoint.to_string(),
                    status,
                    body: detail,
                })
            }
        }
    }

    fn encode<B: Serialize>(endpoint: &str, body: &B) -> Result<Bytes, ApiError> {
        serde_json::to_vec(body)
            .map(Bytes::from)
            .map_err(|source| ApiError::Encode {
                endpoint: endpoint.to_string(),
                source,
            })
    }

    fn decode<T: DeserializeOwned>(endpoint: &str, data: serde_json::Value) -> Result<T, ApiError> {
        serde_json::from_value(data).map_err(|source| ApiError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    /// Make a GET request.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        debug!(endpoint, "GET");
        let data = self.call(Method::Get, endpoint, None).await?;
        Self::decode(endpoint, data)
    }

    /// GET a list; a `null` payload is an empty list.
    pub async fn get_list<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>, ApiError> {
        let list: Option<Vec<T>> = self.get(endpoint).await?;
        Ok(list.unwrap_or_default())
    }

    /// Make a POST request.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(endpoint, "POST");
        let data = self
            .call(Method::Post, endpoint, Some(Self::encode(endpoint, body)?))
            .await?;
        Self::decode(endpoint, data)
    }

    /// Make a PUT request.
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(endpoint, "PUT");
        let data = self
            .call(Method::Put, endpoint, Some(Self::encode(endpoint, body)?))
            .await?;
        Self::decode(endpoint, data)
    }

    /// Make a DELETE request.
    pub async fn delete(&self, endpoint: &str) -> Result<(), ApiError> {
        debug!(endpoint, "DELETE");
        self.call(Method::Delete, endpoint, None).await?;
        Ok(())
    }
}
