//! Parameterised subscriptions.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::client::QueryClient;
use super::handle::QueryHandle;
use super::key::QueryKey;
use super::state::{QueryError, QueryState};

type KeyFn<P> = Box<dyn Fn(&P) -> QueryKey + Send + Sync>;
type ParamFetchFn<P, T, E> = Arc<dyn Fn(P) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Binds a resource family to the cache.
///
/// The binder derives a key from its parameters and keeps exactly one
/// subscription alive. Changing the parameters moves the subscription to the
/// new key; the old one is released afterwards, so data shared with other
/// subscribers is never dropped in between.
///
/// `data()` falls back to `T::default()` until a value has loaded, which for
/// list resources means an empty list rather than a missing value.
pub struct FetchBinder<P, T, E> {
  client: QueryClient,
  key_fn: KeyFn<P>,
  fetch: ParamFetchFn<P, T, E>,
  params: P,
  handle: QueryHandle<T>,
}

impl<P, T, E> FetchBinder<P, T, E>
where
  P: Clone + Send + Sync + 'static,
  T: Default + Send + Sync + 'static,
  E: StdError + Send + Sync + 'static,
{
  pub fn new<K, F, Fut>(client: QueryClient, params: P, key_fn: K, fetch: F) -> Self
  where
    K: Fn(&P) -> QueryKey + Send + Sync + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    let fetch: ParamFetchFn<P, T, E> = Arc::new(move |params| fetch(params).boxed());
    let handle = Self::bind(&client, key_fn(&params), &params, &fetch);

    Self {
      client,
      key_fn: Box::new(key_fn),
      fetch,
      params,
      handle,
    }
  }

  fn bind(
    client: &QueryClient,
    key: QueryKey,
    params: &P,
    fetch: &ParamFetchFn<P, T, E>,
  ) -> QueryHandle<T> {
    let fetch = Arc::clone(fetch);
    let params = params.clone();
    client.subscribe(key, move || fetch(params.clone()))
  }

  /// Switch to new parameters. Returns `true` when the key changed.
  pub fn set_params(&mut self, params: P) -> bool {
    let key = (self.key_fn)(&params);
    self.params = params;
    if &key == self.handle.key() {
      return false;
    }

    debug!(from = %self.handle.key(), to = %key, "switching subscription");
    let next = Self::bind(&self.client, key, &self.params, &self.fetch);
    let previous = std::mem::replace(&mut self.handle, next);
    drop(previous);
    true
  }

  pub fn params(&self) -> &P {
    &self.params
  }

  pub fn key(&self) -> &QueryKey {
    self.handle.key()
  }

  pub fn data(&self) -> Arc<T> {
    self.handle.data().unwrap_or_default()
  }

  pub fn is_loading(&self) -> bool {
    self.handle.is_loading()
  }

  pub fn is_fetching(&self) -> bool {
    self.handle.is_fetching()
  }

  pub fn error(&self) -> Option<QueryError> {
    self.handle.error()
  }

  pub fn state(&self) -> QueryState<T> {
    self.handle.state()
  }

  pub fn refetch(&self) -> bool {
    self.client.refetch(self.handle.key())
  }

  pub async fn changed(&mut self) -> bool {
    self.handle.changed().await
  }

  pub async fn settled(&mut self) -> QueryState<T> {
    self.handle.settled().await
  }
}
