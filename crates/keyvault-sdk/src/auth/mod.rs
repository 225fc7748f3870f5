//! Credential types and interfaces.
//!
//! This module provides:
//! - `AccessToken`, the bearer token attached to every vault request
//! - `TokenCredential`, the seam through which tokens are obtained
//! - `StaticTokenCredential`, a fixed-token credential for playback and tests
//!
//! Acquiring tokens from an identity provider is left to the caller's own
//! `TokenCredential` implementation.

use chrono::{DateTime, Duration, Utc};

use crate::error::AuthError;

/// OAuth scope for Key Vault data-plane requests.
pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

/// Bearer token sent as `Authorization: Bearer <token>`; `Debug` prints only
/// its expiry.
///
/// ```
/// use keyvault_sdk::auth::AccessToken;
/// use chrono::{Utc, Duration};
///
/// let token = AccessToken::new("eyJ0eXAi...", Utc::now() + Duration::hours(1));
/// assert!(!token.is_expired());
/// assert!(!token.expires_soon(Duration::minutes(5)));
/// ```
#[derive(Clone)]
pub struct AccessToken {
    token: String,
    expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_on(&self) -> DateTime<Utc> {
        self.expires_on
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_on
    }

    /// True when the token is expired or will be within `margin`.
    pub fn expires_soon(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_on
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("expires_on", &self.expires_on)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// Source of access tokens for vault requests.
#[async_trait::async_trait]
pub trait TokenCredential: Send + Sync {
    /// Get a token valid for the requested scopes.
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, AuthError>;
}

/// Credential that always returns the same token.
///
/// Used against recorded or simulated vaults where the service does not
/// validate the bearer token. A request without scopes receives an already
/// expired token, mirroring how a real identity provider rejects it.
#[derive(Clone)]
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    /// Create a credential returning `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Default for StaticTokenCredential {
    fn default() -> Self {
        Self::new("magicToken")
    }
}

impl std::fmt::Debug for StaticTokenCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenCredential")
            .field("token", &"<REDACTED>")
            .finish()
    }
}

#[async_trait::async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, AuthError> {
        let expires_on = if scopes.is_empty() {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        };
        Ok(AccessToken::new(self.token.clone(), expires_on))
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
