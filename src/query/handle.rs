//! Live subscription to one cache entry.

use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;

use super::client::QueryClient;
use super::key::QueryKey;
use super::state::{EntrySnapshot, QueryError, QueryState, QueryStatus};

/// A live subscription returned by [`QueryClient::subscribe`].
///
/// The handle counts as one subscriber for as long as it exists; dropping it
/// unsubscribes. Readers never see an error thrown at them: failures are
/// reported through [`QueryHandle::error`] while the last good value stays
/// readable.
pub struct QueryHandle<T> {
  client: QueryClient,
  key: QueryKey,
  entry_id: u64,
  receiver: watch::Receiver<EntrySnapshot>,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> QueryHandle<T> {
  pub(crate) fn new(
    client: QueryClient,
    key: QueryKey,
    entry_id: u64,
    receiver: watch::Receiver<EntrySnapshot>,
  ) -> Self {
    Self {
      client,
      key,
      entry_id,
      receiver,
      _marker: PhantomData,
    }
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// Current state of the entry.
  pub fn state(&self) -> QueryState<T> {
    QueryState::from_snapshot(&self.receiver.borrow())
  }

  pub fn status(&self) -> QueryStatus {
    self.receiver.borrow().status
  }

  pub fn data(&self) -> Option<Arc<T>> {
    self.state().data
  }

  pub fn error(&self) -> Option<QueryError> {
    self.receiver.borrow().error.clone()
  }

  /// Loading with no value to show yet.
  pub fn is_loading(&self) -> bool {
    let snapshot = self.receiver.borrow();
    snapshot.status == QueryStatus::Loading && snapshot.value.is_none()
  }

  /// A fetch is in flight, first load or refetch.
  pub fn is_fetching(&self) -> bool {
    self.receiver.borrow().fetching
  }

  /// Wait for the next change to the entry.
  ///
  /// Returns `false` once the entry has been removed from the cache.
  pub async fn changed(&mut self) -> bool {
    self.receiver.changed().await.is_ok()
  }

  /// Wait until no fetch is pending and the entry holds a result.
  pub async fn settled(&mut self) -> QueryState<T> {
    let _ = self
      .receiver
      .wait_for(|snapshot| snapshot.status.is_settled() && !snapshot.fetching)
      .await;
    self.state()
  }
}

impl<T> Drop for QueryHandle<T> {
  fn drop(&mut self) {
    self.client.release(&self.key, self.entry_id);
  }
}

impl<T> std::fmt::Debug for QueryHandle<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryHandle")
      .field("key", &self.key)
      .field("status", &self.receiver.borrow().status)
      .finish_non_exhaustive()
  }
}
