//! Certificate operations.
//!
//! Creating a certificate is a long-running operation: the vault accepts the
//! request, issues the certificate in the background and reports progress at
//! `/certificates/{name}/pending`. Deletion follows the same soft-delete flow
//! as keys.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use url::Url;

use super::attributes::{DeletionInfo, ObjectAttributes};
use super::deletion::{SoftDeleteProtocol, SoftDeleted};
use super::executor::{RawResponse, VaultRequest};
use super::identifier::{validate_name, VaultObjectId};
use super::keys::{KeyCurveName, KeyType};
use super::operation::{
    LongRunningOperation, OperationHandle, OperationStatus, PollStep, PollingProtocol,
};
use super::pagination::Pager;
use super::VaultClient;
use crate::error::VaultError;

#[cfg(test)]
#[path = "certificates_tests.rs"]
mod tests;

// ============================================================================
// Policy Models
// ============================================================================

/// Format of the secret backing a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificateContentType {
    #[serde(rename = "application/x-pkcs12")]
    Pkcs12,
    #[serde(rename = "application/x-pem-file")]
    Pem,
    #[serde(other)]
    Unknown,
}

/// X.509 key usage flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CertificateKeyUsage {
    DigitalSignature,
    NonRepudiation,
    KeyEncipherment,
    DataEncipherment,
    KeyAgreement,
    KeyCertSign,
    #[serde(rename = "cRLSign")]
    CrlSign,
    EncipherOnly,
    DecipherOnly,
    #[serde(other)]
    Unknown,
}

/// Action taken when a lifetime trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificatePolicyAction {
    AutoRenew,
    EmailContacts,
    #[serde(other)]
    Unknown,
}

/// Action to take at a point in a certificate's lifetime.
///
/// Exactly one of `lifetime_percentage` and `days_before_expiry` is expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifetimeAction {
    pub action: CertificatePolicyAction,
    pub lifetime_percentage: Option<i32>,
    pub days_before_expiry: Option<i32>,
}

impl LifetimeAction {
    pub fn at_lifetime_percentage(action: CertificatePolicyAction, percentage: i32) -> Self {
        Self {
            action,
            lifetime_percentage: Some(percentage),
            days_before_expiry: None,
        }
    }

    pub fn days_before_expiry(action: CertificatePolicyAction, days: i32) -> Self {
        Self {
            action,
            lifetime_percentage: None,
            days_before_expiry: Some(days),
        }
    }
}

/// How a certificate is issued and managed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PolicyWire", into = "PolicyWire")]
pub struct CertificatePolicy {
    pub subject: String,
    pub issuer_name: Option<String>,
    pub certificate_type: Option<String>,
    pub validity_in_months: Option<i32>,
    pub content_type: Option<CertificateContentType>,
    pub key_type: Option<KeyType>,
    pub key_size: Option<u32>,
    pub key_curve_name: Option<KeyCurveName>,
    pub exportable: Option<bool>,
    pub reuse_key: Option<bool>,
    pub key_usage: Vec<CertificateKeyUsage>,
    pub enhanced_key_usage: Vec<String>,
    pub lifetime_actions: Vec<LifetimeAction>,
    pub enabled: Option<bool>,
}

impl CertificatePolicy {
    /// Policy for a certificate signed by the vault itself.
    pub fn self_signed(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            issuer_name: Some("Self".to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PolicyWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_props: Option<KeyPropsWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret_props: Option<SecretPropsWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x509_props: Option<X509PropsWire>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    lifetime_actions: Vec<LifetimeActionWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issuer: Option<IssuerWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attributes: Option<ObjectAttributes>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct KeyPropsWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exportable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kty: Option<KeyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    crv: Option<KeyCurveName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reuse_key: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SecretPropsWire {
    #[serde(rename = "contentType", default, skip_serializing_if = "Option::is_none")]
    content_type: Option<CertificateContentType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct X509PropsWire {
    #[serde(default)]
    subject: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ekus: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    key_usage: Vec<CertificateKeyUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    validity_months: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LifetimeActionWire {
    trigger: TriggerWire,
    action: ActionWire,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TriggerWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lifetime_percentage: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    days_before_expiry: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActionWire {
    action_type: CertificatePolicyAction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IssuerWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "cty", default, skip_serializing_if = "Option::is_none")]
    certificate_type: Option<String>,
}

impl From<PolicyWire> for CertificatePolicy {
    fn from(wire: PolicyWire) -> Self {
        let key = wire.key_props.unwrap_or_default();
        let x509 = wire.x509_props.unwrap_or_default();
        let issuer = wire.issuer.unwrap_or_default();

        Self {
            subject: x509.subject,
            issuer_name: issuer.name,
            certificate_type: issuer.certificate_type,
            validity_in_months: x509.validity_months,
            content_type: wire.secret_props.and_then(|s| s.content_type),
            key_type: key.kty,
            key_size: key.key_size,
            key_curve_name: key.crv,
            exportable: key.exportable,
            reuse_key: key.reuse_key,
            key_usage: x509.key_usage,
            enhanced_key_usage: x509.ekus,
            lifetime_actions: wire
                .lifetime_actions
                .into_iter()
                .map(|a| LifetimeAction {
                    action: a.action.action_type,
                    lifetime_percentage: a.trigger.lifetime_percentage,
                    days_before_expiry: a.trigger.days_before_expiry,
                })
                .collect(),
            enabled: wire.attributes.and_then(|a| a.enabled),
        }
    }
}

impl From<CertificatePolicy> for PolicyWire {
    fn from(policy: CertificatePolicy) -> Self {
        let has_key_props = policy.key_type.is_some()
            || policy.key_size.is_some()
            || policy.key_curve_name.is_some()
            || policy.exportable.is_some()
            || policy.reuse_key.is_some();

        Self {
            key_props: has_key_props.then(|| KeyPropsWire {
                exportable: policy.exportable,
                kty: policy.key_type,
                key_size: policy.key_size,
                crv: policy.key_curve_name,
                reuse_key: policy.reuse_key,
            }),
            secret_props: policy.content_type.map(|content_type| SecretPropsWire {
                content_type: Some(content_type),
            }),
            x509_props: Some(X509PropsWire {
                subject: policy.subject,
                ekus: policy.enhanced_key_usage,
                key_usage: policy.key_usage,
                validity_months: policy.validity_in_months,
            }),
            lifetime_actions: policy
                .lifetime_actions
                .into_iter()
                .map(|a| LifetimeActionWire {
                    trigger: TriggerWire {
                        lifetime_percentage: a.lifetime_percentage,
                        days_before_expiry: a.days_before_expiry,
                    },
                    action: ActionWire {
                        action_type: a.action,
                    },
                })
                .collect(),
            issuer: (policy.issuer_name.is_some() || policy.certificate_type.is_some()).then(
                || IssuerWire {
                    name: policy.issuer_name,
                    certificate_type: policy.certificate_type,
                },
            ),
            attributes: ObjectAttributes::settable(policy.enabled, None, None),
        }
    }
}

// ============================================================================
// Certificate Models
// ============================================================================

/// Identity and management attributes of one certificate version.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "CertificateWire")]
pub struct CertificateProperties {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    pub vault_url: String,
    /// Base64url SHA-1 thumbprint
    pub x509_thumbprint: Option<String>,
    pub enabled: Option<bool>,
    pub not_before: Option<DateTime<Utc>>,
    pub expires_on: Option<DateTime<Utc>>,
    pub created_on: Option<DateTime<Utc>>,
    pub updated_on: Option<DateTime<Utc>>,
    pub recovery_level: Option<String>,
    pub recoverable_days: Option<i32>,
    pub tags: HashMap<String, String>,
}

/// A certificate with its public bytes and current policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "CertificateWire")]
pub struct KeyVaultCertificateWithPolicy {
    pub properties: CertificateProperties,
    /// Identifier of the key backing the certificate
    pub key_id: Option<String>,
    /// Identifier of the secret holding the certificate and its private key
    pub secret_id: Option<String>,
    /// Base64 DER-encoded certificate
    pub cer: Option<String>,
    pub policy: Option<CertificatePolicy>,
}

impl KeyVaultCertificateWithPolicy {
    pub fn id(&self) -> &str {
        &self.properties.id
    }

    pub fn name(&self) -> &str {
        &self.properties.name
    }
}

/// A soft-deleted certificate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "CertificateWire")]
pub struct DeletedCertificate {
    pub certificate: KeyVaultCertificateWithPolicy,
    pub recovery_id: Option<String>,
    pub deleted_on: Option<DateTime<Utc>>,
    pub scheduled_purge_date: Option<DateTime<Utc>>,
}

impl DeletedCertificate {
    pub fn name(&self) -> &str {
        self.certificate.name()
    }
}

/// Certificate bundle, certificate item and their deleted variants.
#[derive(Deserialize)]
struct CertificateWire {
    #[serde(default)]
    id: String,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    sid: Option<String>,
    #[serde(default)]
    x5t: Option<String>,
    #[serde(default)]
    cer: Option<String>,
    #[serde(default)]
    policy: Option<CertificatePolicy>,
    #[serde(default)]
    attributes: ObjectAttributes,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(flatten)]
    deletion: DeletionInfo,
}

impl CertificateWire {
    fn properties(&self) -> CertificateProperties {
        let parsed = VaultObjectId::parse(&self.id).ok();

        CertificateProperties {
            id: self.id.clone(),
            name: parsed.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
            version: parsed.as_ref().and_then(|p| p.version.clone()),
            vault_url: parsed.map(|p| p.vault_url).unwrap_or_default(),
            x509_thumbprint: self.x5t.clone(),
            enabled: self.attributes.enabled,
            not_before: self.attributes.not_before,
            expires_on: self.attributes.expires_on,
            created_on: self.attributes.created_on,
            updated_on: self.attributes.updated_on,
            recovery_level: self.attributes.recovery_level.clone(),
            recoverable_days: self.attributes.recoverable_days,
            tags: self.tags.clone(),
        }
    }
}

impl From<CertificateWire> for CertificateProperties {
    fn from(wire: CertificateWire) -> Self {
        wire.properties()
    }
}

impl From<CertificateWire> for KeyVaultCertificateWithPolicy {
    fn from(wire: CertificateWire) -> Self {
        let properties = wire.properties();
        Self {
            properties,
            key_id: wire.kid,
            secret_id: wire.sid,
            cer: wire.cer,
            policy: wire.policy,
        }
    }
}

impl From<CertificateWire> for DeletedCertificate {
    fn from(mut wire: CertificateWire) -> Self {
        let deletion = std::mem::take(&mut wire.deletion);
        Self {
            certificate: wire.into(),
            recovery_id: deletion.recovery_id,
            deleted_on: deletion.deleted_on,
            scheduled_purge_date: deletion.scheduled_purge_date,
        }
    }
}

/// State of a pending certificate issuance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CertificateOperationProperties {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub status_details: Option<String>,
    #[serde(default)]
    pub csr: Option<String>,
    #[serde(default)]
    pub cancellation_requested: Option<bool>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub error: Option<CertificateOperationError>,
}

/// Error reported for a failed issuance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CertificateOperationError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl CertificateOperationProperties {
    /// Name of the certificate being issued.
    pub fn name(&self) -> String {
        VaultObjectId::name_of(&self.id)
    }

    fn step(self) -> PollStep<Self> {
        match self.status.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("completed") => PollStep::succeeded(self),
            Some("failed") | Some("cancelled") => {
                let message = match (&self.error, &self.status_details) {
                    (Some(error), _) => format!("{}: {}", error.code, error.message),
                    (None, Some(details)) => details.clone(),
                    (None, None) => format!(
                        "certificate operation {}",
                        self.status.as_deref().unwrap_or_default()
                    ),
                };
                PollStep::failed(message).with_value(self)
            }
            _ => PollStep::in_progress().with_value(self),
        }
    }
}

/// The certificate bytes as stored in the backing secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadCertificateResult {
    /// Base64 PKCS#12 or PEM text, depending on `content_type`
    pub certificate: String,
    pub content_type: Option<CertificateContentType>,
}

#[derive(Deserialize)]
struct SecretWire {
    value: String,
    #[serde(rename = "contentType", default)]
    content_type: Option<CertificateContentType>,
}

// ============================================================================
// Create Operation
// ============================================================================

/// Options for creating a certificate.
#[derive(Debug, Clone)]
pub struct CertificateCreateOptions {
    pub policy: CertificatePolicy,
    pub enabled: Option<bool>,
    pub tags: HashMap<String, String>,
}

impl CertificateCreateOptions {
    pub fn new(policy: CertificatePolicy) -> Self {
        Self {
            policy,
            enabled: None,
            tags: HashMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

#[derive(Serialize)]
struct CreateCertificateParameters {
    policy: CertificatePolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes: Option<ObjectAttributes>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    tags: HashMap<String, String>,
}

/// Maps certificate operation statuses onto poll steps.
///
/// `inProgress` is in progress, `completed` succeeded, `failed` and
/// `cancelled` failed.
#[derive(Debug, Clone)]
pub struct CreateCertificateProtocol {
    name: String,
}

impl CreateCertificateProtocol {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl PollingProtocol for CreateCertificateProtocol {
    type Output = CertificateOperationProperties;

    fn resource_name(&self) -> &str {
        &self.name
    }

    fn on_start(
        &self,
        client: &VaultClient,
        response: &RawResponse,
    ) -> Result<PollStep<Self::Output>, VaultError> {
        let operation: CertificateOperationProperties = response.json()?;
        let polling_url = client.url(&format!("/certificates/{}/pending", self.name))?;
        Ok(operation.step().with_polling_url(polling_url))
    }

    fn on_poll(
        &self,
        response: &RawResponse,
        _last: Option<&Self::Output>,
    ) -> Result<PollStep<Self::Output>, VaultError> {
        let response = response.clone().error_for_status()?;
        Ok(response.json::<CertificateOperationProperties>()?.step())
    }
}

/// Pending issuance of a certificate.
///
/// Completing the operation fetches the issued certificate.
pub struct CreateCertificateOperation {
    operation: LongRunningOperation<CreateCertificateProtocol>,
}

impl CreateCertificateOperation {
    /// Observe `token` while polling and fetching the issued certificate.
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        Self {
            operation: self.operation.with_cancellation(token),
        }
    }

    pub fn handle(&self) -> &OperationHandle<CertificateOperationProperties> {
        self.operation.handle()
    }

    pub fn status(&self) -> OperationStatus {
        self.operation.status()
    }

    pub fn is_done(&self) -> bool {
        self.operation.is_done()
    }

    /// Last observed state of the issuance.
    pub fn value(&self) -> Option<&CertificateOperationProperties> {
        self.operation.value()
    }

    /// Issue one status check.
    pub async fn poll(&mut self) -> Result<&OperationHandle<CertificateOperationProperties>, VaultError> {
        self.operation.poll().await
    }

    /// Poll until issuance finishes, then fetch the certificate.
    ///
    /// # Errors
    ///
    /// - `VaultError::OperationFailed` if issuance failed or was cancelled
    /// - `VaultError::Cancelled` when the cancellation token fires
    /// - any transport or service error from polling or the final fetch
    pub async fn poll_until_done(
        &mut self,
        poll_interval: Duration,
    ) -> Result<KeyVaultCertificateWithPolicy, VaultError> {
        self.operation.poll_until_done(poll_interval).await?;

        let name = self.operation.handle().resource_name().to_string();
        let client = self.operation.client();
        let url = client.url(&format!("/certificates/{}", name))?;
        let certificate: KeyVaultCertificateWithPolicy = client
            .send(VaultRequest::get(url), self.operation.cancellation())
            .await?
            .error_for_status()?
            .json()?;

        info!(certificate = %name, version = ?certificate.properties.version, "Certificate issued");
        Ok(certificate)
    }

    /// `poll_until_done` with the client's default poll interval.
    pub async fn wait_for_completion(&mut self) -> Result<KeyVaultCertificateWithPolicy, VaultError> {
        let interval = self.operation.client().config().default_poll_interval;
        self.poll_until_done(interval).await
    }
}

impl std::fmt::Debug for CreateCertificateOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateCertificateOperation")
            .field("handle", self.operation.handle())
            .finish()
    }
}

// ============================================================================
// Delete Operation
// ============================================================================

impl SoftDeleted for DeletedCertificate {
    const DELETED_COLLECTION: &'static str = "deletedcertificates";

    fn recovery_id(&self) -> Option<&str> {
        self.recovery_id.as_deref()
    }
}

/// Polls a deleted certificate until it is listed under `/deletedcertificates`.
pub type DeleteCertificateProtocol = SoftDeleteProtocol<DeletedCertificate>;

/// Pending deletion of a certificate.
pub type DeleteCertificateOperation = LongRunningOperation<DeleteCertificateProtocol>;

// ============================================================================
// Certificate Client
// ============================================================================

/// Certificate operations against one vault.
#[derive(Debug, Clone)]
pub struct CertificateClient {
    client: VaultClient,
}

impl CertificateClient {
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

    /// Start issuing a certificate, or a new version of an existing one.
    #[instrument(skip(self, options))]
    pub async fn start_create_certificate(
        &self,
        name: &str,
        options: CertificateCreateOptions,
    ) -> Result<CreateCertificateOperation, VaultError> {
        validate_name(name)?;
        let url = self.client.url(&format!("/certificates/{}/create", name))?;
        let body = serde_json::to_value(CreateCertificateParameters {
            policy: options.policy,
            attributes: ObjectAttributes::settable(options.enabled, None, None),
            tags: options.tags,
        })?;

        let operation = self
            .client
            .start_operation(VaultRequest::post(url, body), CreateCertificateProtocol::new(name))
            .await?;
        Ok(CreateCertificateOperation { operation })
    }

    /// Get the latest version of a certificate with its policy.
    pub async fn get_certificate(&self, name: &str) -> Result<KeyVaultCertificateWithPolicy, VaultError> {
        validate_name(name)?;
        let url = self.client.url(&format!("/certificates/{}", name))?;
        self.client.send_checked(VaultRequest::get(url)).await?.json()
    }

    /// Get the state of the most recent issuance of a certificate.
    pub async fn get_certificate_operation(
        &self,
        name: &str,
    ) -> Result<CertificateOperationProperties, VaultError> {
        validate_name(name)?;
        let url = self.client.url(&format!("/certificates/{}/pending", name))?;
        self.client.send_checked(VaultRequest::get(url)).await?.json()
    }

    pub async fn get_properties_of_certificates(
        &self,
    ) -> Result<Pager<CertificateProperties>, VaultError> {
        self.client.first_page("/certificates").await
    }

    /// Delete every version of a certificate.
    #[instrument(skip(self))]
    pub async fn start_delete_certificate(
        &self,
        name: &str,
    ) -> Result<DeleteCertificateOperation, VaultError> {
        validate_name(name)?;
        let url = self.client.url(&format!("/certificates/{}", name))?;
        self.client
            .start_operation(VaultRequest::delete(url), DeleteCertificateProtocol::new(name))
            .await
    }

    pub async fn get_deleted_certificates(&self) -> Result<Pager<DeletedCertificate>, VaultError> {
        self.client.first_page("/deletedcertificates").await
    }

    /// Permanently remove a soft-deleted certificate.
    #[instrument(skip(self))]
    pub async fn purge_deleted_certificate(&self, name: &str) -> Result<(), VaultError> {
        validate_name(name)?;
        let url = self.client.url(&format!("/deletedcertificates/{}", name))?;
        self.client.send_checked(VaultRequest::delete(url)).await?;
        info!(certificate = name, "Purged deleted certificate");
        Ok(())
    }

    /// Download the certificate together with its private key.
    ///
    /// Reads the secret that backs the certificate; the format follows the
    /// policy's content type.
    #[instrument(skip(self))]
    pub async fn download_certificate(&self, name: &str) -> Result<DownloadCertificateResult, VaultError> {
        let certificate = self.get_certificate(name).await?;
        let secret_id = certificate.secret_id.as_deref().ok_or_else(|| {
            VaultError::invalid_response(format!("Certificate '{}' has no backing secret", name))
        })?;

        let secret = VaultObjectId::parse(secret_id)?;
        let path = match &secret.version {
            Some(version) => format!("/secrets/{}/{}", secret.name, version),
            None => format!("/secrets/{}", secret.name),
        };
        let url = self.client.url(&path)?;
        let secret: SecretWire = self.client.send_checked(VaultRequest::get(url)).await?.json()?;

        Ok(DownloadCertificateResult {
            certificate: secret.value,
            content_type: secret.content_type,
        })
    }
}
