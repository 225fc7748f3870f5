//! Error types for Key Vault SDK operations.
//!
//! This module defines all error types used throughout the SDK, with
//! classification for retry logic and enough context to debug a failed call.

use thiserror::Error;

/// Errors produced by vault operations.
///
/// Transport and service failures are surfaced to the immediate caller; the
/// protocols never retry on their own. Retries happen in the request executor.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The request could not be sent or no response was received.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The service answered with a non-success status code.
    #[error("Service error: {status} - {body}")]
    Service { status: u16, body: String },

    /// A long-running operation reached the Failed terminal state.
    #[error("Operation on '{resource}' failed: {message}")]
    OperationFailed { resource: String, message: String },

    /// Cancellation was requested while the call was suspended.
    #[error("Operation cancelled")]
    Cancelled,

    /// The credential could not supply an access token.
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),

    /// A response could not be interpreted.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    /// The client was configured with invalid values.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Failed to (de)serialize a JSON payload.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VaultError {
    /// Check if this error represents a transient condition that may succeed if retried.
    ///
    /// Transient conditions include:
    /// - Transport failures
    /// - Server errors (5xx)
    /// - Throttling (429) and request timeouts (408)
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Service { status, .. } => is_transient_status(*status),
            Self::OperationFailed { .. } => false,
            Self::Cancelled => false,
            Self::Authentication(e) => e.is_transient(),
            Self::InvalidResponse { .. } => false,
            Self::Configuration { .. } => false,
            Self::Json(_) => false,
        }
    }

    /// HTTP status code for service errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the service reported the resource as missing (404).
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Returns true if the service reported a conflict (409).
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// Returns true if the caller cancelled the call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub(crate) fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for VaultError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport {
            message: e.to_string(),
        }
    }
}

/// Status codes the transport layer treats as retryable.
pub(crate) fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}

/// Credential errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The credential rejected the token request.
    #[error("Token request rejected: {message}")]
    TokenRequestFailed { message: String },

    /// The credential returned a token that has already expired.
    #[error("Access token expired")]
    TokenExpired,

    /// The identity provider could not be reached.
    #[error("Credential unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    /// Check if this error represents a transient condition.
    ///
    /// Only `Unavailable` is considered transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Errors raised while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("{variable} is required but not set as an environment variable")]
    MissingEnvVar { variable: String },

    /// A value is set but cannot be used.
    #[error("Invalid value for {variable}: {message}")]
    InvalidValue { variable: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
