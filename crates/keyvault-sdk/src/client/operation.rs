//! Long-running operation polling.
//!
//! Some vault operations (key deletion, certificate issuance) do not finish
//! within one request. The initiating call returns an `OperationHandle`; the
//! handle is then polled at a server-provided location until it reaches a
//! terminal status. How a response maps to a status is decided per operation by
//! a `PollingProtocol`.
//!
//! Polls are strictly sequential: `poll` and `poll_until_done` take
//! `&mut self`, so one operation can never be polled concurrently.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::executor::{RawResponse, VaultRequest};
use super::VaultClient;
use crate::error::VaultError;

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;

/// Status of a long-running operation.
///
/// Ordered `NotStarted < InProgress < {Succeeded, Failed}`. Once terminal, a
/// status never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    NotStarted,
    InProgress,
    Succeeded,
    Failed,
}

impl OperationStatus {
    /// Returns true for `Succeeded` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::InProgress => 1,
            Self::Succeeded | Self::Failed => 2,
        }
    }

    /// Status after observing `next`.
    ///
    /// Terminal statuses are sticky and an observation that would move the
    /// status backwards is ignored.
    pub fn advance(self, next: Self) -> Self {
        if self.is_terminal() || next.rank() < self.rank() {
            self
        } else {
            next
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "NotStarted",
            Self::InProgress => "InProgress",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

/// One interpreted response of a long-running operation.
#[derive(Debug, Clone)]
pub struct PollStep<T> {
    pub status: OperationStatus,
    pub value: Option<T>,
    pub polling_url: Option<Url>,
    pub failure: Option<String>,
}

impl<T> PollStep<T> {
    pub fn not_started() -> Self {
        Self::with_status(OperationStatus::NotStarted)
    }

    pub fn in_progress() -> Self {
        Self::with_status(OperationStatus::InProgress)
    }

    pub fn succeeded(value: T) -> Self {
        Self::with_status(OperationStatus::Succeeded).with_value(value)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::with_status(OperationStatus::Failed)
        }
    }

    pub fn with_value(mut self, value: T) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_polling_url(mut self, url: Url) -> Self {
        self.polling_url = Some(url);
        self
    }

    fn with_status(status: OperationStatus) -> Self {
        Self {
            status,
            value: None,
            polling_url: None,
            failure: None,
        }
    }
}

/// Maps the responses of one kind of operation onto `PollStep`s.
pub trait PollingProtocol: Send + Sync + 'static {
    /// Final value of a successful operation.
    type Output: Clone + Send + Sync + 'static;

    /// Name of the resource being operated on.
    fn resource_name(&self) -> &str;

    /// Interpret the successful response of the initiating request.
    ///
    /// A non-terminal step must carry the polling URL.
    fn on_start(
        &self,
        client: &VaultClient,
        response: &RawResponse,
    ) -> Result<PollStep<Self::Output>, VaultError>;

    /// Interpret a status-check response.
    ///
    /// Receives every response regardless of HTTP status, together with the
    /// last known value of the operation.
    fn on_poll(
        &self,
        response: &RawResponse,
        last: Option<&Self::Output>,
    ) -> Result<PollStep<Self::Output>, VaultError>;
}

/// Last observed state of a long-running operation.
#[derive(Debug, Clone)]
pub struct OperationHandle<T> {
    resource_name: String,
    status: OperationStatus,
    polling_url: Option<Url>,
    value: Option<T>,
    failure: Option<String>,
    polls: u32,
}

impl<T> OperationHandle<T> {
    fn new(resource_name: String, step: PollStep<T>) -> Self {
        let mut handle = Self {
            resource_name,
            status: OperationStatus::NotStarted,
            polling_url: None,
            value: None,
            failure: None,
            polls: 0,
        };
        handle.apply(step);
        handle
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn is_done(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn polling_url(&self) -> Option<&Url> {
        self.polling_url.as_ref()
    }

    /// Last known value; for a succeeded operation, its result.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Failure reported by the service for a failed operation.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Number of status checks issued so far.
    pub fn poll_count(&self) -> u32 {
        self.polls
    }

    fn apply(&mut self, step: PollStep<T>) {
        if self.status.is_terminal() {
            return;
        }

        self.status = self.status.advance(step.status);
        if step.value.is_some() {
            self.value = step.value;
        }
        if step.polling_url.is_some() {
            self.polling_url = step.polling_url;
        }
        if self.status == OperationStatus::Failed {
            self.failure = Some(
                step.failure
                    .unwrap_or_else(|| "operation reported failure".to_string()),
            );
        }
    }
}

/// A server-side operation being driven to completion.
pub struct LongRunningOperation<P: PollingProtocol> {
    client: VaultClient,
    protocol: P,
    handle: OperationHandle<P::Output>,
    cancel: Option<CancellationToken>,
}

impl<P: PollingProtocol> LongRunningOperation<P> {
    /// Issue the initiating request. The operation observes the client's
    /// cancellation token, if it has one.
    ///
    /// # Errors
    ///
    /// - `VaultError::Transport` if the request cannot be sent
    /// - `VaultError::Service` if the service rejects it
    /// - `VaultError::InvalidResponse` if the operation is not finished and no
    ///   polling location was returned
    /// - `VaultError::Cancelled` if the client's token fires first
    #[instrument(skip(client, request, protocol), fields(resource = protocol.resource_name()))]
    pub async fn start(
        client: VaultClient,
        request: VaultRequest,
        protocol: P,
    ) -> Result<Self, VaultError> {
        let cancel = client.cancellation().cloned();
        let response = client.send(request, cancel.as_ref()).await?.error_for_status()?;
        let step = protocol.on_start(&client, &response)?;

        if !step.status.is_terminal() && step.polling_url.is_none() {
            return Err(VaultError::invalid_response(format!(
                "Operation on '{}' is {} but no polling location was returned",
                protocol.resource_name(),
                step.status
            )));
        }

        let handle = OperationHandle::new(protocol.resource_name().to_string(), step);
        info!(resource = handle.resource_name(), status = %handle.status(), "Long-running operation started");

        Ok(Self {
            client,
            protocol,
            handle,
            cancel,
        })
    }

    /// Observe `token` instead of the client's at every suspend point of
    /// `poll` and `poll_until_done`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn handle(&self) -> &OperationHandle<P::Output> {
        &self.handle
    }

    pub fn status(&self) -> OperationStatus {
        self.handle.status
    }

    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    pub fn value(&self) -> Option<&P::Output> {
        self.handle.value()
    }

    pub(crate) fn client(&self) -> &VaultClient {
        &self.client
    }

    pub(crate) fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// Issue one status check and return the updated handle.
    ///
    /// A terminal handle is returned as-is without a request; a failed one
    /// keeps returning `OperationFailed`.
    ///
    /// # Errors
    ///
    /// - `VaultError::Transport` / `VaultError::Service` for a failed status
    ///   check; the handle is unchanged and the caller may poll again
    /// - `VaultError::OperationFailed` once the service reports failure
    /// - `VaultError::Cancelled` if cancellation is observed mid-request
    pub async fn poll(&mut self) -> Result<&OperationHandle<P::Output>, VaultError> {
        match self.handle.status {
            OperationStatus::Succeeded => return Ok(&self.handle),
            OperationStatus::Failed => return Err(self.failure_error()),
            _ => {}
        }

        let url = self.handle.polling_url.clone().ok_or_else(|| {
            VaultError::invalid_response(format!(
                "Operation on '{}' has no polling location",
                self.handle.resource_name
            ))
        })?;
        let request = VaultRequest::get(self.client.apply_api_version(url));

        let response = self.client.send(request, self.cancel.as_ref()).await?;
        let step = self.protocol.on_poll(&response, self.handle.value.as_ref())?;

        self.handle.polls += 1;
        self.handle.apply(step);
        debug!(
            resource = self.handle.resource_name(),
            status = %self.handle.status,
            polls = self.handle.polls,
            "Polled long-running operation"
        );

        if self.handle.status == OperationStatus::Failed {
            warn!(
                resource = self.handle.resource_name(),
                failure = self.handle.failure().unwrap_or_default(),
                "Long-running operation failed"
            );
            return Err(self.failure_error());
        }
        Ok(&self.handle)
    }

    /// Poll until the operation reaches a terminal status, waiting
    /// `poll_interval` between checks.
    ///
    /// Returns immediately, without a request, when the handle is already
    /// terminal. The first error ends the loop and leaves the handle in its last
    /// observed state.
    ///
    /// # Errors
    ///
    /// - `VaultError::OperationFailed` when the operation fails
    /// - `VaultError::Cancelled` when the cancellation token fires
    /// - any error from `poll`
    pub async fn poll_until_done(&mut self, poll_interval: Duration) -> Result<P::Output, VaultError> {
        loop {
            match self.handle.status {
                OperationStatus::Succeeded => return self.final_value(),
                OperationStatus::Failed => return Err(self.failure_error()),
                _ => {}
            }

            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                return Err(VaultError::Cancelled);
            }

            self.poll().await?;
            if self.handle.status.is_terminal() {
                continue;
            }

            match &self.cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Err(VaultError::Cancelled),
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }
                None => tokio::time::sleep(poll_interval).await,
            }
        }
    }

    /// `poll_until_done` with the client's default poll interval.
    pub async fn wait_for_completion(&mut self) -> Result<P::Output, VaultError> {
        let interval = self.client.config().default_poll_interval;
        self.poll_until_done(interval).await
    }

    fn final_value(&self) -> Result<P::Output, VaultError> {
        self.handle.value.clone().ok_or_else(|| {
            VaultError::invalid_response(format!(
                "Operation on '{}' succeeded without a result",
                self.handle.resource_name
            ))
        })
    }

    fn failure_error(&self) -> VaultError {
        VaultError::OperationFailed {
            resource: self.handle.resource_name.clone(),
            message: self
                .handle
                .failure
                .clone()
                .unwrap_or_else(|| "operation reported failure".to_string()),
        }
    }
}

impl<P: PollingProtocol> fmt::Debug for LongRunningOperation<P>
where
    P::Output: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LongRunningOperation")
            .field("handle", &self.handle)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}
