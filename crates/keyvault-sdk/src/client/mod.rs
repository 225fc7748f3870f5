//! Vault client for authenticated key and certificate operations.
//!
//! This module provides the `VaultClient` that owns the request pipeline
//! (vault URL, API version, request executor), plus the two protocols built
//! on top of it:
//! - `LongRunningOperation`, which polls server-side operations to completion
//! - `Pager`, which walks server-paginated collections
//!
//! `KeyClient` and `CertificateClient` expose the typed vault operations.

mod attributes;
mod certificates;
mod deletion;
mod executor;
mod identifier;
mod keys;
mod operation;
mod pagination;
mod retry;


use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::instrument;
use url::Url;

use crate::auth::TokenCredential;
use crate::error::VaultError;

pub use certificates::{
    CertificateClient, CertificateContentType, CertificateCreateOptions, CertificateKeyUsage,
    CertificateOperationError, CertificateOperationProperties, CertificatePolicy, CertificatePolicyAction,
    CertificateProperties, CreateCertificateOperation, CreateCertificateProtocol,
    DeleteCertificateOperation, DeleteCertificateProtocol, DeletedCertificate,
    DownloadCertificateResult, KeyVaultCertificateWithPolicy, LifetimeAction,
};
pub use deletion::{SoftDeleteProtocol, SoftDeleted};
pub use executor::{HttpExecutor, RawResponse, RequestExecutor, VaultRequest};
pub use identifier::VaultObjectId;
pub use keys::{
    CreateEcKeyOptions, CreateRsaKeyOptions, DeleteKeyOperation, DeleteKeyProtocol, DeletedKey,
    JsonWebKey, KeyClient, KeyCurveName, KeyOperation, KeyProperties, KeyType, KeyVaultKey,
};
pub use operation::{
    LongRunningOperation, OperationHandle, OperationStatus, PollStep, PollingProtocol,
};
pub use pagination::{Page, PageCursor, Pager};
pub use retry::{parse_retry_after, RetryPolicy};

/// Key Vault REST API version sent as `api-version` when none is configured.
pub const DEFAULT_API_VERSION: &str = "7.4";

/// Knobs shared by every request a [`VaultClient`] sends.
///
/// ```
/// use keyvault_sdk::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_poll_interval(Duration::from_millis(500))
///     .with_page_size(25);
/// assert_eq!(config.page_size, Some(25));
/// assert_eq!(config.retry.max_retries, 3);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Value of the `api-version` query parameter, also forced onto `nextLink`s
    pub api_version: String,
    pub user_agent: String,
    /// Per-request HTTP timeout
    pub timeout: Duration,
    /// Backoff for throttled or unreachable requests
    pub retry: RetryPolicy,
    /// Sleep between polls in `wait_for_completion`
    pub default_poll_interval: Duration,
    /// Sent as `maxresults` on the first request of a listing
    pub page_size: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            user_agent: concat!("keyvault-sdk/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            default_poll_interval: Duration::from_secs(2),
            page_size: None,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn with_api_version(self, api_version: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Keeps the backoff delays and changes only how often a request is retried.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn with_poll_interval(self, default_poll_interval: Duration) -> Self {
        Self {
            default_poll_interval,
            ..self
        }
    }

    pub fn with_page_size(self, page_size: u32) -> Self {
        Self {
            page_size: Some(page_size),
            ..self
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }
}

/// Step-by-step construction of a [`ClientConfig`], starting from its defaults.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    inner: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn api_version(self, api_version: impl Into<String>) -> Self {
        Self {
            inner: self.inner.with_api_version(api_version),
        }
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.inner.user_agent = user_agent.into();
        self
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        Self {
            inner: self.inner.with_timeout(timeout),
        }
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.inner.retry = policy;
        self
    }

    /// `0` turns transport retries off.
    pub fn max_retries(self, max_retries: u32) -> Self {
        Self {
            inner: self.inner.with_max_retries(max_retries),
        }
    }

    /// Base wait before the first retry and the ceiling on later ones.
    pub fn retry_delays(mut self, base: Duration, ceiling: Duration) -> Self {
        self.inner.retry.base_delay = base;
        self.inner.retry.delay_ceiling = ceiling;
        self
    }

    pub fn poll_interval(self, interval: Duration) -> Self {
        Self {
            inner: self.inner.with_poll_interval(interval),
        }
    }

    pub fn page_size(self, page_size: u32) -> Self {
        Self {
            inner: self.inner.with_page_size(page_size),
        }
    }

    pub fn build(self) -> ClientConfig {
        self.inner
    }
}

/// Vault request pipeline shared by the key and certificate clients.
///
/// Cheap to clone; clones share the executor.
///
/// # Examples
///
/// ```no_run
/// # use keyvault_sdk::auth::StaticTokenCredential;
/// # use keyvault_sdk::client::{ClientConfig, VaultClient};
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = VaultClient::builder("https://myvault.vault.azure.net", StaticTokenCredential::default())
///     .config(ClientConfig::default())
///     .build()?;
/// let keys = client.keys();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct VaultClient {
    vault_url: Url,
    executor: Arc<dyn RequestExecutor>,
    config: ClientConfig,
    cancel: Option<CancellationToken>,
}

impl VaultClient {
    /// Create a new builder for a client bound to `vault_url`.
    pub fn builder(
        vault_url: impl Into<String>,
        credential: impl TokenCredential + 'static,
    ) -> VaultClientBuilder {
        VaultClientBuilder::new(vault_url.into(), Arc::new(credential))
    }

    pub fn vault_url(&self) -> &Url {
        &self.vault_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Clone of this client whose requests all observe `token`.
    ///
    /// Pagers and long-running operations started from the clone inherit the
    /// token; their own `with_cancellation` replaces it.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..self.clone()
        }
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// Key operations against this vault.
    pub fn keys(&self) -> KeyClient {
        KeyClient::new(self.clone())
    }

    /// Certificate operations against this vault.
    pub fn certificates(&self) -> CertificateClient {
        CertificateClient::new(self.clone())
    }

    /// Build a request URL for `path` relative to the vault, with the API version applied.
    pub fn url(&self, path: &str) -> Result<Url, VaultError> {
        let url = self
            .vault_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| VaultError::Configuration {
                message: format!("Invalid request path '{}': {}", path, e),
            })?;
        Ok(self.apply_api_version(url))
    }

    /// Replace any `api-version` on a server-provided URL with the client's.
    pub fn apply_api_version(&self, mut url: Url) -> Url {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != "api-version")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &pairs {
                query.append_pair(key, value);
            }
            query.append_pair("api-version", &self.config.api_version);
        }
        url
    }

    /// Send a request, racing it against `cancel`, or the client's own token
    /// when `cancel` is `None`.
    ///
    /// Every HTTP status is returned as a response. A token that has already
    /// fired sends nothing.
    pub async fn send(
        &self,
        request: VaultRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<RawResponse, VaultError> {
        match cancel.or(self.cancel.as_ref()) {
            Some(token) if token.is_cancelled() => Err(VaultError::Cancelled),
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(VaultError::Cancelled),
                    response = self.executor.execute(request) => response,
                }
            }
            None => self.executor.execute(request).await,
        }
    }

    /// Send a request and map non-success statuses to `VaultError::Service`.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn send_checked(&self, request: VaultRequest) -> Result<RawResponse, VaultError> {
        self.send(request, None).await?.error_for_status()
    }

    /// Fetch the first page of a collection.
    pub async fn first_page<T>(&self, path: &str) -> Result<Pager<T>, VaultError>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        let mut url = self.url(path)?;
        if let Some(page_size) = self.config.page_size {
            url.query_pairs_mut()
                .append_pair("maxresults", &page_size.to_string());
        }
        Pager::first_page(self.clone(), VaultRequest::get(url)).await
    }

    /// Issue the initiating request of a long-running operation.
    pub async fn start_operation<P: PollingProtocol>(
        &self,
        request: VaultRequest,
        protocol: P,
    ) -> Result<LongRunningOperation<P>, VaultError> {
        LongRunningOperation::start(self.clone(), request, protocol).await
    }
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("vault_url", &self.vault_url.as_str())
            .field("config", &self.config)
            .field("executor", &"<RequestExecutor>")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// Collects the vault URL, credential and optional overrides for a [`VaultClient`].
pub struct VaultClientBuilder {
    vault_url: String,
    credential: Arc<dyn TokenCredential>,
    config: Option<ClientConfig>,
    executor: Option<Arc<dyn RequestExecutor>>,
}

impl VaultClientBuilder {
    fn new(vault_url: String, credential: Arc<dyn TokenCredential>) -> Self {
        Self {
            vault_url,
            credential,
            config: None,
            executor: None,
        }
    }

    /// Defaults to [`ClientConfig::default`].
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the HTTP executor, e.g. with a recording or scripted one.
    pub fn executor(mut self, executor: Arc<dyn RequestExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Fails with `VaultError::Configuration` if the vault URL is not an absolute
    /// http(s) URL or the HTTP client cannot be created.
    pub fn build(self) -> Result<VaultClient, VaultError> {
        let config = self.config.unwrap_or_default();
        let mut vault_url = Url::parse(&self.vault_url).map_err(|e| VaultError::Configuration {
            message: format!("Invalid vault URL '{}': {}", self.vault_url, e),
        })?;
        if !matches!(vault_url.scheme(), "http" | "https") || vault_url.host_str().is_none() {
            return Err(VaultError::Configuration {
                message: format!("Vault URL '{}' must be an http(s) URL", self.vault_url),
            });
        }
        // Relative request paths resolve under the last segment only when the
        // base ends in '/'.
        if !vault_url.path().ends_with('/') {
            let path = format!("{}/", vault_url.path());
            vault_url.set_path(&path);
        }

        let executor = match self.executor {
            Some(executor) => executor,
            None => Arc::new(HttpExecutor::new(self.credential, &config)?),
        };

        Ok(VaultClient {
            vault_url,
            executor,
            config,
            cancel: None,
        })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
