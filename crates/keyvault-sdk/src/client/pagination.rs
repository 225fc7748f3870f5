//! Pagination support for vault collections.
//!
//! List endpoints return `{"value": [...], "nextLink": "..."}`. The `nextLink`
//! URL carries the continuation token as its `$skiptoken` query parameter; the
//! listing is exhausted once a page arrives without one.

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::executor::VaultRequest;
use super::VaultClient;
use crate::error::VaultError;

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod tests;

/// Consecutive empty pages followed before a listing is treated as broken.
pub const MAX_EMPTY_PAGES: u32 = 32;

/// One page of a collection as returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items in this page
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,

    /// URL of the next page, absent on the last page
    #[serde(rename = "nextLink", default, skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}

/// The current batch of a listing plus where the next batch starts.
#[derive(Debug, Clone)]
pub struct PageCursor<T> {
    items: Vec<T>,
    next_link: Option<Url>,
}

impl<T> PageCursor<T> {
    fn exhausted() -> Self {
        Self {
            items: Vec::new(),
            next_link: None,
        }
    }

    fn from_page(page: Page<T>) -> Result<Self, VaultError> {
        let next_link = match page.next_link.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(link) => Some(Url::parse(link).map_err(|e| {
                VaultError::invalid_response(format!("Invalid nextLink '{}': {}", link, e))
            })?),
        };

        Ok(Self {
            items: page.value,
            next_link,
        })
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// URL of the next page.
    pub fn next_link(&self) -> Option<&Url> {
        self.next_link.as_ref()
    }

    /// Opaque token identifying where the next page begins.
    ///
    /// This is the `$skiptoken` of the next link, or the whole link when the
    /// service does not use one.
    pub fn continuation_token(&self) -> Option<String> {
        let link = self.next_link.as_ref()?;
        link.query_pairs()
            .find(|(key, _)| key == "$skiptoken")
            .map(|(_, value)| value.into_owned())
            .or_else(|| Some(link.to_string()))
    }
}

/// Forward-only iteration over a server-paginated collection.
///
/// Obtained from `VaultClient::first_page` or one of the typed list operations.
/// Every pager is one independent pass over the listing.
///
/// # Examples
///
/// ```no_run
/// # use keyvault_sdk::client::{KeyProperties, Pager};
/// # async fn example(mut pager: Pager<KeyProperties>) -> Result<(), keyvault_sdk::VaultError> {
/// while pager.has_page() {
///     for key in pager.items() {
///         println!("{}", key.name);
///     }
///     pager.move_to_next_page().await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Pager<T> {
    client: VaultClient,
    cursor: PageCursor<T>,
    cancel: Option<CancellationToken>,
    pages: u32,
}

impl<T> Pager<T>
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    /// Issue the initial list request, observing the client's cancellation
    /// token.
    ///
    /// # Errors
    ///
    /// - `VaultError::Transport` if the request cannot be sent
    /// - `VaultError::Service` if the service rejects it
    /// - `VaultError::InvalidResponse` if the body is not a page, or more than
    ///   `MAX_EMPTY_PAGES` empty pages arrive in a row
    /// - `VaultError::Cancelled` if the client's token fires
    pub async fn first_page(client: VaultClient, request: VaultRequest) -> Result<Self, VaultError> {
        let cancel = client.cancellation().cloned();
        let (cursor, fetched) = fetch_non_empty(&client, request, cancel.as_ref()).await?;
        debug!(items = cursor.items.len(), pages = fetched, "Fetched first page");

        Ok(Self {
            client,
            cursor,
            cancel,
            pages: fetched,
        })
    }

    /// Observe `token` instead of the client's while fetching further pages.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// True while the current batch holds items.
    ///
    /// Empty pages in the middle of a listing are skipped, so until the items
    /// are taken, `false` means the listing is exhausted.
    pub fn has_page(&self) -> bool {
        !self.cursor.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        self.cursor.items()
    }

    /// Move the current batch out of the pager.
    pub fn take_items(&mut self) -> Vec<T> {
        std::mem::take(&mut self.cursor.items)
    }

    pub fn cursor(&self) -> &PageCursor<T> {
        &self.cursor
    }

    pub fn continuation_token(&self) -> Option<String> {
        self.cursor.continuation_token()
    }

    /// Number of pages fetched so far.
    pub fn page_count(&self) -> u32 {
        self.pages
    }

    /// Replace the current batch with the next one.
    ///
    /// Without a continuation token the batch becomes empty; calling again
    /// after that is a no-op. On error the current batch is kept.
    ///
    /// # Errors
    ///
    /// - `VaultError::Transport` / `VaultError::Service` if the fetch fails
    /// - `VaultError::InvalidResponse` after `MAX_EMPTY_PAGES` empty pages
    /// - `VaultError::Cancelled` if the cancellation token fires
    pub async fn move_to_next_page(&mut self) -> Result<(), VaultError> {
        let Some(next_link) = self.cursor.next_link.clone() else {
            self.cursor = PageCursor::exhausted();
            return Ok(());
        };

        let request = VaultRequest::get(self.client.apply_api_version(next_link));
        let (cursor, fetched) = fetch_non_empty(&self.client, request, self.cancel.as_ref()).await?;

        self.cursor = cursor;
        self.pages += fetched;
        debug!(
            items = self.cursor.items.len(),
            pages = self.pages,
            has_more = self.cursor.next_link.is_some(),
            "Fetched next page"
        );
        Ok(())
    }

    /// Lazily yield every remaining item, fetching pages on demand.
    pub fn into_stream(self) -> BoxStream<'static, Result<T, VaultError>> {
        stream::try_unfold((self, true), |(pager, first)| next_batch(pager, first))
            .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }

    /// Drain the remaining pages into one vector.
    pub async fn collect_all(mut self) -> Result<Vec<T>, VaultError> {
        let mut all = self.take_items();
        while self.cursor.next_link.is_some() {
            self.move_to_next_page().await?;
            all.extend(self.take_items());
        }
        Ok(all)
    }
}

async fn next_batch<T>(
    mut pager: Pager<T>,
    first: bool,
) -> Result<Option<(Vec<T>, (Pager<T>, bool))>, VaultError>
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    if !first {
        pager.move_to_next_page().await?;
    }
    if !pager.has_page() {
        return Ok(None);
    }
    let items = pager.take_items();
    Ok(Some((items, (pager, false))))
}

/// Fetch pages starting at `request` until one has items or no next link.
///
/// Returns the cursor and the number of pages fetched. `cancel` is checked
/// before every request.
async fn fetch_non_empty<T>(
    client: &VaultClient,
    mut request: VaultRequest,
    cancel: Option<&CancellationToken>,
) -> Result<(PageCursor<T>, u32), VaultError>
where
    T: serde::de::DeserializeOwned,
{
    let mut fetched = 0;
    loop {
        if cancel.is_some_and(|t| t.is_cancelled()) {
            return Err(VaultError::Cancelled);
        }

        let page: Page<T> = client.send(request, cancel).await?.error_for_status()?.json()?;
        let cursor = PageCursor::from_page(page)?;
        fetched += 1;

        match (&cursor.next_link, cursor.items.is_empty()) {
            (Some(_), true) if fetched > MAX_EMPTY_PAGES => {
                return Err(VaultError::invalid_response(format!(
                    "Listing returned {} empty pages in a row",
                    fetched
                )));
            }
            (Some(next_link), true) => {
                debug!(next_link = %next_link, "Skipping empty page");
                request = VaultRequest::get(client.apply_api_version(next_link.clone()));
            }
            _ => return Ok((cursor, fetched)),
        }
    }
}
