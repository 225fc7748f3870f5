//! Request execution.
//!
//! The protocols in this crate only ever see a `RequestExecutor`: it sends one
//! request and hands back status, headers and body, or fails with a transport
//! error. Authentication headers, transport retries and TLS all live behind it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::retry::{parse_retry_after, RetryPolicy};
use super::ClientConfig;
use crate::auth::{TokenCredential, KEY_VAULT_SCOPE};
use crate::error::{is_transient_status, AuthError, VaultError};

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

/// A single HTTP request against the vault.
#[derive(Debug, Clone)]
pub struct VaultRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<serde_json::Value>,
}

impl VaultRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn post(url: Url, body: serde_json::Value) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Status, headers and body of one HTTP exchange.
///
/// Header names are stored lower-cased.
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Build a response with a JSON body.
    pub fn json_body(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string()).with_header("content-type", "application/json")
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, VaultError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            VaultError::invalid_response(format!(
                "Failed to parse response body (status {}): {}",
                self.status, e
            ))
        })
    }

    /// Turn a non-success status into `VaultError::Service`.
    pub fn error_for_status(self) -> Result<Self, VaultError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(VaultError::Service {
                status: self.status,
                body: self.text(),
            })
        }
    }
}

/// Sends one request and returns the raw response.
///
/// Implementations return `Ok` for every HTTP status; only failures to obtain
/// a response at all are errors.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, request: VaultRequest) -> Result<RawResponse, VaultError>;
}

/// `reqwest`-backed executor with bearer authentication and transport retries.
///
/// An expired token from the credential fails the request before it is sent.
/// A `Retry-After` wait is honoured up to the policy's delay ceiling.
pub struct HttpExecutor {
    http_client: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    retry_policy: RetryPolicy,
}

impl HttpExecutor {
    /// Create an executor from client configuration.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Configuration` if the HTTP client cannot be created.
    pub fn new(
        credential: Arc<dyn TokenCredential>,
        config: &ClientConfig,
    ) -> Result<Self, VaultError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| VaultError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            credential,
            retry_policy: config.retry_policy(),
        })
    }

    async fn send_once(&self, request: &VaultRequest) -> Result<reqwest::Response, VaultError> {
        let token = self.credential.get_token(&[KEY_VAULT_SCOPE]).await?;
        if token.is_expired() {
            warn!(expires_on = %token.expires_on(), "Credential returned an expired token");
            return Err(AuthError::TokenExpired.into());
        }

        let mut builder = self
            .http_client
            .request(request.method.clone(), request.url.clone())
            .bearer_auth(token.token())
            .header("Accept", "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }
}

impl std::fmt::Debug for HttpExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExecutor")
            .field("retry_policy", &self.retry_policy)
            .field("credential", &"<TokenCredential>")
            .finish()
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, request: VaultRequest) -> Result<RawResponse, VaultError> {
        let mut retries = 0u32;

        loop {
            debug!(method = %request.method, url = %request.url, attempt = retries, "Sending vault request");

            let response = match self.send_once(&request).await {
                Ok(response) => response,
                Err(e @ VaultError::Transport { .. }) if self.retry_policy.allows_retry(retries) => {
                    retries += 1;
                    let delay = self.retry_policy.delay_for(retries);
                    warn!(url = %request.url, error = %e, delay_ms = delay.as_millis() as u64, "Transport failure, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let status = response.status().as_u16();
            let mut headers = HashMap::new();
            for (name, value) in response.headers() {
                if let Ok(value) = value.to_str() {
                    headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
                }
            }

            if is_transient_status(status) && self.retry_policy.allows_retry(retries) {
                retries += 1;
                let delay = headers
                    .get("retry-after")
                    .and_then(|v| parse_retry_after(v))
                    .map(|wait| wait.min(self.retry_policy.delay_ceiling))
                    .unwrap_or_else(|| self.retry_policy.delay_for(retries));
                warn!(url = %request.url, status, delay_ms = delay.as_millis() as u64, "Transient status, retrying");
                tokio::time::sleep(delay).await;
                continue;
            }

            let body = response.bytes().await?;
            debug!(url = %request.url, status, "Received vault response");
            return Ok(RawResponse {
                status,
                headers,
                body,
            });
        }
    }
}
