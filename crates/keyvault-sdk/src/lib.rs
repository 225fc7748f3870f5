//! # Key Vault SDK
//!
//! Client for the Key Vault REST API covering keys and certificates, built
//! around two protocols:
//! - long-running operations (key deletion, certificate issuance) that are
//!   polled at a server-provided location until they reach a terminal status
//! - paged collections that are walked by following server-issued next links
//!
//! # Examples
//!
//! ## Deleting a key
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use keyvault_sdk::{StaticTokenCredential, VaultClient};
//!
//! # async fn example() -> Result<(), keyvault_sdk::VaultError> {
//! let client = VaultClient::builder("https://myvault.vault.azure.net", StaticTokenCredential::default())
//!     .build()?;
//! let keys = client.keys();
//!
//! let mut operation = keys.start_delete_key("my-key").await?;
//! let deleted = operation.poll_until_done(Duration::from_secs(2)).await?;
//! println!("deleted {}", deleted.name());
//! # Ok(())
//! # }
//! ```
//!
//! ## Listing keys
//!
//! ```rust,no_run
//! use futures::TryStreamExt;
//! use keyvault_sdk::{StaticTokenCredential, VaultClient};
//!
//! # async fn example() -> Result<(), keyvault_sdk::VaultError> {
//! let client = VaultClient::builder("https://myvault.vault.azure.net", StaticTokenCredential::default())
//!     .build()?;
//!
//! let mut keys = client.keys().get_properties_of_keys().await?.into_stream();
//! while let Some(key) = keys.try_next().await? {
//!     println!("{}", key.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;

pub use error::{AuthError, ConfigError, VaultError};

pub use auth::{AccessToken, StaticTokenCredential, TokenCredential};

pub use client::{
    CertificateClient, CertificatePolicy, ClientConfig, CreateCertificateOperation,
    DeleteCertificateOperation, DeleteKeyOperation, KeyClient, LongRunningOperation,
    OperationHandle, OperationStatus, PageCursor, Pager, PollingProtocol, VaultClient,
};

pub use config::VaultEnvironment;
