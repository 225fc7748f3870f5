//! Soft-delete polling shared by keys and certificates.
//!
//! Deleting an object returns the deleted entity right away, but on a vault
//! with soft delete enabled it only shows up in the deleted collection after a
//! delay. The operation is done once `GET /{deleted collection}/{name}` finds
//! it.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use super::executor::RawResponse;
use super::operation::{PollStep, PollingProtocol};
use super::VaultClient;
use crate::error::VaultError;

/// A deleted entity returned by a delete call.
pub trait SoftDeleted: DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection the entity is listed in once deleted, e.g. `deletedkeys`.
    const DELETED_COLLECTION: &'static str;

    /// Set when the vault has soft delete enabled.
    fn recovery_id(&self) -> Option<&str>;
}

/// Polls a soft-deleted object until it shows up in the deleted collection.
///
/// - Without a `recoveryId` the vault has no soft delete and the operation is
///   already finished.
/// - `404` means deletion is still in progress.
/// - `403` means the caller may not read deleted objects; the deletion itself
///   went through, so the operation succeeds with the initial response.
#[derive(Debug, Clone)]
pub struct SoftDeleteProtocol<T> {
    name: String,
    _deleted: PhantomData<fn() -> T>,
}

impl<T: SoftDeleted> SoftDeleteProtocol<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _deleted: PhantomData,
        }
    }
}

impl<T: SoftDeleted> PollingProtocol for SoftDeleteProtocol<T> {
    type Output = T;

    fn resource_name(&self) -> &str {
        &self.name
    }

    fn on_start(&self, client: &VaultClient, response: &RawResponse) -> Result<PollStep<T>, VaultError> {
        let deleted: T = response.json()?;
        if deleted.recovery_id().is_none() {
            return Ok(PollStep::succeeded(deleted));
        }

        let polling_url = client.url(&format!("/{}/{}", T::DELETED_COLLECTION, self.name))?;
        Ok(PollStep::in_progress()
            .with_value(deleted)
            .with_polling_url(polling_url))
    }

    fn on_poll(&self, response: &RawResponse, last: Option<&T>) -> Result<PollStep<T>, VaultError> {
        match response.status() {
            200 => Ok(PollStep::succeeded(response.json()?)),
            404 => Ok(PollStep::in_progress()),
            403 => last.cloned().map(PollStep::succeeded).ok_or_else(|| {
                VaultError::invalid_response(format!(
                    "Deletion of '{}' cannot be observed and no deleted object was returned",
                    self.name
                ))
            }),
            status => Err(VaultError::Service {
                status,
                body: response.text(),
            }),
        }
    }
}
