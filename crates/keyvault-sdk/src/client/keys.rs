//! Key operations.
//!
//! Keys are created, read, listed and soft-deleted through the vault's `/keys`
//! collection. Deletion is a long-running operation: once soft-deleted, a key
//! appears under `/deletedkeys` after a delay and can then be purged.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use url::Url;

use super::attributes::{DeletionInfo, ObjectAttributes};
use super::deletion::{SoftDeleteProtocol, SoftDeleted};
use super::executor::VaultRequest;
use super::identifier::{validate_name, VaultObjectId};
use super::operation::LongRunningOperation;
use super::pagination::Pager;
use super::VaultClient;
use crate::error::VaultError;

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;

// ============================================================================
// Key Models
// ============================================================================

/// JSON Web Key type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    #[serde(rename = "EC")]
    Ec,
    #[serde(rename = "EC-HSM")]
    EcHsm,
    #[serde(rename = "RSA")]
    Rsa,
    #[serde(rename = "RSA-HSM")]
    RsaHsm,
    #[serde(rename = "oct")]
    Oct,
    #[serde(rename = "oct-HSM")]
    OctHsm,
    #[serde(other)]
    Unknown,
}

/// Elliptic curve of an EC key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCurveName {
    #[serde(rename = "P-256")]
    P256,
    #[serde(rename = "P-256K")]
    P256K,
    #[serde(rename = "P-384")]
    P384,
    #[serde(rename = "P-521")]
    P521,
    #[serde(other)]
    Unknown,
}

/// Operation a key may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyOperation {
    Encrypt,
    Decrypt,
    Sign,
    Verify,
    WrapKey,
    UnwrapKey,
    Import,
    #[serde(other)]
    Unknown,
}

/// Public key material as returned by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    #[serde(rename = "kid", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "kty", default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<KeyType>,

    #[serde(rename = "key_ops", default, skip_serializing_if = "Vec::is_empty")]
    pub key_operations: Vec<KeyOperation>,

    #[serde(rename = "crv", default, skip_serializing_if = "Option::is_none")]
    pub curve_name: Option<KeyCurveName>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

/// Identity and management attributes of one key version.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "KeyWire")]
pub struct KeyProperties {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    pub vault_url: String,
    pub enabled: Option<bool>,
    pub not_before: Option<DateTime<Utc>>,
    pub expires_on: Option<DateTime<Utc>>,
    pub created_on: Option<DateTime<Utc>>,
    pub updated_on: Option<DateTime<Utc>>,
    pub recovery_level: Option<String>,
    pub recoverable_days: Option<i32>,
    pub tags: HashMap<String, String>,
    pub managed: bool,
}

/// A key with its material.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "KeyWire")]
pub struct KeyVaultKey {
    pub key: JsonWebKey,
    pub properties: KeyProperties,
}

impl KeyVaultKey {
    pub fn id(&self) -> &str {
        &self.properties.id
    }

    pub fn name(&self) -> &str {
        &self.properties.name
    }

    pub fn key_type(&self) -> Option<KeyType> {
        self.key.key_type
    }
}

/// A soft-deleted key.
///
/// Listing deleted keys returns no key material, so `key` is only present when
/// the key was fetched individually.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "KeyWire")]
pub struct DeletedKey {
    pub key: Option<JsonWebKey>,
    pub properties: KeyProperties,
    pub recovery_id: Option<String>,
    pub deleted_on: Option<DateTime<Utc>>,
    pub scheduled_purge_date: Option<DateTime<Utc>>,
}

impl DeletedKey {
    pub fn name(&self) -> &str {
        &self.properties.name
    }
}

/// Key bundle, key item and their deleted variants share this shape.
#[derive(Deserialize)]
struct KeyWire {
    #[serde(default)]
    key: Option<JsonWebKey>,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    attributes: ObjectAttributes,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    managed: bool,
    #[serde(flatten)]
    deletion: DeletionInfo,
}

impl KeyWire {
    fn properties(&self) -> KeyProperties {
        let id = self
            .key
            .as_ref()
            .and_then(|k| k.id.clone())
            .or_else(|| self.kid.clone())
            .unwrap_or_default();
        let parsed = VaultObjectId::parse(&id).ok();

        KeyProperties {
            name: parsed.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
            version: parsed.as_ref().and_then(|p| p.version.clone()),
            vault_url: parsed.map(|p| p.vault_url).unwrap_or_default(),
            id,
            enabled: self.attributes.enabled,
            not_before: self.attributes.not_before,
            expires_on: self.attributes.expires_on,
            created_on: self.attributes.created_on,
            updated_on: self.attributes.updated_on,
            recovery_level: self.attributes.recovery_level.clone(),
            recoverable_days: self.attributes.recoverable_days,
            tags: self.tags.clone(),
            managed: self.managed,
        }
    }
}

impl From<KeyWire> for KeyProperties {
    fn from(wire: KeyWire) -> Self {
        wire.properties()
    }
}

impl From<KeyWire> for KeyVaultKey {
    fn from(wire: KeyWire) -> Self {
        let properties = wire.properties();
        Self {
            key: wire.key.unwrap_or_default(),
            properties,
        }
    }
}

impl From<KeyWire> for DeletedKey {
    fn from(wire: KeyWire) -> Self {
        let properties = wire.properties();
        Self {
            key: wire.key,
            properties,
            recovery_id: wire.deletion.recovery_id,
            deleted_on: wire.deletion.deleted_on,
            scheduled_purge_date: wire.deletion.scheduled_purge_date,
        }
    }
}

// ============================================================================
// Create Options
// ============================================================================

/// Options for creating an elliptic curve key.
#[derive(Debug, Clone)]
pub struct CreateEcKeyOptions {
    pub name: String,
    pub hardware_protected: bool,
    pub curve: Option<KeyCurveName>,
    pub key_operations: Vec<KeyOperation>,
    pub enabled: Option<bool>,
    pub not_before: Option<DateTime<Utc>>,
    pub expires_on: Option<DateTime<Utc>>,
    pub tags: HashMap<String, String>,
}

impl CreateEcKeyOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hardware_protected: false,
            curve: None,
            key_operations: Vec::new(),
            enabled: None,
            not_before: None,
            expires_on: None,
            tags: HashMap::new(),
        }
    }

    pub fn with_curve(mut self, curve: KeyCurveName) -> Self {
        self.curve = Some(curve);
        self
    }

    pub fn with_hardware_protection(mut self) -> Self {
        self.hardware_protected = true;
        self
    }

    pub fn with_operations(mut self, operations: impl IntoIterator<Item = KeyOperation>) -> Self {
        self.key_operations = operations.into_iter().collect();
        self
    }

    pub fn with_expiry(mut self, expires_on: DateTime<Utc>) -> Self {
        self.expires_on = Some(expires_on);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    fn parameters(&self) -> CreateKeyParameters {
        CreateKeyParameters {
            key_type: if self.hardware_protected {
                KeyType::EcHsm
            } else {
                KeyType::Ec
            },
            curve: self.curve,
            key_size: None,
            public_exponent: None,
            key_operations: self.key_operations.clone(),
            attributes: ObjectAttributes::settable(self.enabled, self.not_before, self.expires_on),
            tags: self.tags.clone(),
        }
    }
}

/// Options for creating an RSA key.
#[derive(Debug, Clone)]
pub struct CreateRsaKeyOptions {
    pub name: String,
    pub hardware_protected: bool,
    pub key_size: Option<u32>,
    pub public_exponent: Option<u32>,
    pub key_operations: Vec<KeyOperation>,
    pub enabled: Option<bool>,
    pub not_before: Option<DateTime<Utc>>,
    pub expires_on: Option<DateTime<Utc>>,
    pub tags: HashMap<String, String>,
}

impl CreateRsaKeyOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hardware_protected: false,
            key_size: None,
            public_exponent: None,
            key_operations: Vec::new(),
            enabled: None,
            not_before: None,
            expires_on: None,
            tags: HashMap::new(),
        }
    }

    pub fn with_key_size(mut self, key_size: u32) -> Self {
        self.key_size = Some(key_size);
        self
    }

    pub fn with_hardware_protection(mut self) -> Self {
        self.hardware_protected = true;
        self
    }

    pub fn with_operations(mut self, operations: impl IntoIterator<Item = KeyOperation>) -> Self {
        self.key_operations = operations.into_iter().collect();
        self
    }

    fn parameters(&self) -> CreateKeyParameters {
        CreateKeyParameters {
            key_type: if self.hardware_protected {
                KeyType::RsaHsm
            } else {
                KeyType::Rsa
            },
            curve: None,
            key_size: self.key_size,
            public_exponent: self.public_exponent,
            key_operations: self.key_operations.clone(),
            attributes: ObjectAttributes::settable(self.enabled, self.not_before, self.expires_on),
            tags: self.tags.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateKeyParameters {
    #[serde(rename = "kty")]
    key_type: KeyType,
    #[serde(rename = "crv", skip_serializing_if = "Option::is_none")]
    curve: Option<KeyCurveName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_exponent: Option<u32>,
    #[serde(rename = "key_ops", skip_serializing_if = "Vec::is_empty")]
    key_operations: Vec<KeyOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes: Option<ObjectAttributes>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    tags: HashMap<String, String>,
}

// ============================================================================
// Delete Operation
// ============================================================================

impl SoftDeleted for DeletedKey {
    const DELETED_COLLECTION: &'static str = "deletedkeys";

    fn recovery_id(&self) -> Option<&str> {
        self.recovery_id.as_deref()
    }
}

/// Polls a deleted key until it is listed under `/deletedkeys`.
pub type DeleteKeyProtocol = SoftDeleteProtocol<DeletedKey>;

/// Pending deletion of a key.
pub type DeleteKeyOperation = LongRunningOperation<DeleteKeyProtocol>;

// ============================================================================
// Key Client
// ============================================================================

/// Key operations against one vault.
#[derive(Debug, Clone)]
pub struct KeyClient {
    client: VaultClient,
}

impl KeyClient {
    pub(crate) fn new(client: VaultClient) -> Self {
        Self { client }
    }

    pub fn vault_url(&self) -> &Url {
        self.client.vault_url()
    }

    /// Clone whose requests, listings and operations all observe `token`.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self::new(self.client.with_cancellation(token))
    }

    /// Create a new EC key, or a new version of an existing one.
    #[instrument(skip(self, options), fields(key = %options.name))]
    pub async fn create_ec_key(&self, options: CreateEcKeyOptions) -> Result<KeyVaultKey, VaultError> {
        self.create_key(&options.name, options.parameters()).await
    }

    /// Create a new RSA key, or a new version of an existing one.
    #[instrument(skip(self, options), fields(key = %options.name))]
    pub async fn create_rsa_key(&self, options: CreateRsaKeyOptions) -> Result<KeyVaultKey, VaultError> {
        self.create_key(&options.name, options.parameters()).await
    }

    async fn create_key(
        &self,
        name: &str,
        parameters: CreateKeyParameters,
    ) -> Result<KeyVaultKey, VaultError> {
        validate_name(name)?;
        let url = self.client.url(&format!("/keys/{}/create", name))?;
        let body = serde_json::to_value(&parameters)?;

        let key: KeyVaultKey = self
            .client
            .send_checked(VaultRequest::post(url, body))
            .await?
            .json()?;
        info!(key = key.name(), version = ?key.properties.version, "Created key");
        Ok(key)
    }

    /// Get a key; the latest version when `version` is `None`.
    pub async fn get_key(&self, name: &str, version: Option<&str>) -> Result<KeyVaultKey, VaultError> {
        validate_name(name)?;
        let path = match version {
            Some(version) => format!("/keys/{}/{}", name, version),
            None => format!("/keys/{}", name),
        };
        let url = self.client.url(&path)?;
        self.client.send_checked(VaultRequest::get(url)).await?.json()
    }

    /// List the latest version of every key. Key material is not included.
    pub async fn get_properties_of_keys(&self) -> Result<Pager<KeyProperties>, VaultError> {
        self.client.first_page("/keys").await
    }

    /// List every version of one key.
    pub async fn get_properties_of_key_versions(
        &self,
        name: &str,
    ) -> Result<Pager<KeyProperties>, VaultError> {
        validate_name(name)?;
        self.client
            .first_page(&format!("/keys/{}/versions", name))
            .await
    }

    /// Delete every version of a key.
    ///
    /// The returned operation completes once the key is visible in the
    /// deleted collection.
    #[instrument(skip(self))]
    pub async fn start_delete_key(&self, name: &str) -> Result<DeleteKeyOperation, VaultError> {
        validate_name(name)?;
        let url = self.client.url(&format!("/keys/{}", name))?;
        self.client
            .start_operation(VaultRequest::delete(url), DeleteKeyProtocol::new(name))
            .await
    }

    pub async fn get_deleted_key(&self, name: &str) -> Result<DeletedKey, VaultError> {
        validate_name(name)?;
        let url = self.client.url(&format!("/deletedkeys/{}", name))?;
        self.client.send_checked(VaultRequest::get(url)).await?.json()
    }

    pub async fn get_deleted_keys(&self) -> Result<Pager<DeletedKey>, VaultError> {
        self.client.first_page("/deletedkeys").await
    }

    /// Permanently remove a soft-deleted key.
    #[instrument(skip(self))]
    pub async fn purge_deleted_key(&self, name: &str) -> Result<(), VaultError> {
        validate_name(name)?;
        let url = self.client.url(&format!("/deletedkeys/{}", name))?;
        self.client.send_checked(VaultRequest::delete(url)).await?;
        info!(key = name, "Purged deleted key");
        Ok(())
    }
}
