//! Vault environment configuration
//!
//! Connection settings are read from environment variables:
//! - `AZURE_KEYVAULT_URL`: vault endpoint
//! - `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET`: service principal
//! - `AZURE_KEYVAULT_AVOID_THROTTLED`: any value other than `0` asks callers to
//!   pause between runs so the service does not answer with 429

use std::fmt;
use std::time::Duration;

use url::Url;
use zeroize::Zeroizing;

use crate::error::ConfigError;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

pub const VAULT_URL_VAR: &str = "AZURE_KEYVAULT_URL";
pub const TENANT_ID_VAR: &str = "AZURE_TENANT_ID";
pub const CLIENT_ID_VAR: &str = "AZURE_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "AZURE_CLIENT_SECRET";
pub const AVOID_THROTTLED_VAR: &str = "AZURE_KEYVAULT_AVOID_THROTTLED";

/// Pause that keeps back-to-back runs under the service's request rate limit.
const THROTTLE_DELAY: Duration = Duration::from_secs(10);

const DEFAULT_VAULT_URL: &str = "https://REDACTED.vault.azure.net";
const DEFAULT_TENANT_ID: &str = "tenant";
const DEFAULT_CLIENT_ID: &str = "client";
const DEFAULT_CLIENT_SECRET: &str = "secret";

/// Vault endpoint and service principal.
///
/// The client secret is wiped from memory on drop and never printed.
#[derive(Clone)]
pub struct VaultEnvironment {
    vault_url: String,
    tenant_id: String,
    client_id: String,
    client_secret: Zeroizing<String>,
    avoid_throttled: bool,
}

impl VaultEnvironment {
    pub fn new(
        vault_url: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let environment = Self {
            vault_url: vault_url.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: Zeroizing::new(client_secret.into()),
            avoid_throttled: false,
        };
        environment.validate()?;
        Ok(environment)
    }

    /// Load every setting from the environment.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingEnvVar` if a connection variable is unset and
    /// `ConfigError::InvalidValue` if the vault URL is not an http(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = Self {
            vault_url: required(VAULT_URL_VAR)?,
            tenant_id: required(TENANT_ID_VAR)?,
            client_id: required(CLIENT_ID_VAR)?,
            client_secret: Zeroizing::new(required(CLIENT_SECRET_VAR)?),
            avoid_throttled: avoid_throttled_from_env(),
        };
        environment.validate()?;
        Ok(environment)
    }

    /// Load settings from the environment, substituting placeholder values for
    /// anything unset.
    ///
    /// Used when requests go to a recorded or simulated vault rather than a live
    /// one.
    pub fn from_env_or_defaults() -> Result<Self, ConfigError> {
        let environment = Self {
            vault_url: optional(VAULT_URL_VAR, DEFAULT_VAULT_URL),
            tenant_id: optional(TENANT_ID_VAR, DEFAULT_TENANT_ID),
            client_id: optional(CLIENT_ID_VAR, DEFAULT_CLIENT_ID),
            client_secret: Zeroizing::new(optional(CLIENT_SECRET_VAR, DEFAULT_CLIENT_SECRET)),
            avoid_throttled: avoid_throttled_from_env(),
        };
        environment.validate()?;
        Ok(environment)
    }

    /// Ask callers to pause before talking to the vault.
    pub fn with_throttle_avoidance(mut self, enabled: bool) -> Self {
        self.avoid_throttled = enabled;
        self
    }

    pub fn vault_url(&self) -> &str {
        &self.vault_url
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Pause to take before a run, if throttle avoidance is requested.
    pub fn throttle_delay(&self) -> Option<Duration> {
        self.avoid_throttled.then_some(THROTTLE_DELAY)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            variable: VAULT_URL_VAR.to_string(),
            message,
        };

        let url = Url::parse(&self.vault_url)
            .map_err(|e| invalid(format!("'{}' is not a URL: {}", self.vault_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(invalid(format!("'{}' must be an http(s) URL", self.vault_url)));
        }
        Ok(())
    }
}

impl fmt::Debug for VaultEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultEnvironment")
            .field("vault_url", &self.vault_url)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<REDACTED>")
            .field("avoid_throttled", &self.avoid_throttled)
            .finish()
    }
}

fn required(variable: &str) -> Result<String, ConfigError> {
    std::env::var(variable).map_err(|_| ConfigError::MissingEnvVar {
        variable: variable.to_string(),
    })
}

fn optional(variable: &str, default: &str) -> String {
    std::env::var(variable).unwrap_or_else(|_| default.to_string())
}

fn avoid_throttled_from_env() -> bool {
    optional(AVOID_THROTTLED_VAR, "0") != "0"
}
