//! The process-wide query cache.
//!
//! [`QueryClient`] maps [`QueryKey`]s to cache entries. Each entry remembers
//! the fetch function of its latest subscriber so it can reload itself after
//! an invalidation. Fetches run as Tokio tasks and settle back into the entry;
//! subscribers observe changes through a watch channel.
//!
//! Guarantees:
//! - at most one fetch in flight per key
//! - a successful value is only replaced by another successful fetch
//! - a fetch that started before an invalidation never lands in the cache

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use super::config::QueryConfig;
use super::handle::QueryHandle;
use super::key::QueryKey;
use super::mutation::Mutation;
use super::state::{AnyValue, CacheEvent, EntrySnapshot, QueryError, QueryState, QueryStatus};

type FetchFn = Arc<dyn Fn() -> BoxFuture<'static, Result<AnyValue, QueryError>> + Send + Sync>;

const EVENT_CAPACITY: usize = 256;

struct Entry {
  /// Distinguishes this entry from a later one created under the same key
  id: u64,
  fetcher: Option<FetchFn>,
  subscribers: usize,
  in_flight: Option<u64>,
  /// Invalidated while a fetch was running
  refetch_when_settled: bool,
  gc_epoch: u64,
  state: watch::Sender<EntrySnapshot>,
}

impl Entry {
  fn new(id: u64) -> Self {
    let (state, _) = watch::channel(EntrySnapshot::default());
    Self {
      id,
      fetcher: None,
      subscribers: 0,
      in_flight: None,
      refetch_when_settled: false,
      gc_epoch: 0,
      state,
    }
  }

  fn needs_fetch(&self) -> bool {
    let state = self.state.borrow();
    state.stale || matches!(state.status, QueryStatus::Idle | QueryStatus::Error)
  }
}

struct Inner {
  entries: Mutex<HashMap<QueryKey, Entry>>,
  config: QueryConfig,
  events: broadcast::Sender<CacheEvent>,
  next_id: AtomicU64,
}

/// Shared handle to the query cache. Cloning is cheap and every clone sees
/// the same entries.
///
/// Methods that may start a fetch must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct QueryClient {
  inner: Arc<Inner>,
}

impl QueryClient {
  pub fn new(config: QueryConfig) -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      inner: Arc::new(Inner {
        entries: Mutex::new(HashMap::new()),
        config,
        events,
        next_id: AtomicU64::new(1),
      }),
    }
  }

  pub fn config(&self) -> &QueryConfig {
    &self.inner.config
  }

  /// Register interest in `key`.
  ///
  /// Starts `fetch` when the entry is new, stale or failed and nothing is in
  /// flight. A fresh successful entry is served from the cache, and a running
  /// fetch is joined rather than duplicated.
  pub fn subscribe<T, E, F, Fut>(&self, key: QueryKey, fetch: F) -> QueryHandle<T>
  where
    T: Send + Sync + 'static,
    E: StdError + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    let fetcher: FetchFn = Arc::new(move || {
      let fut = fetch();
      async move {
        fut
          .await
          .map(|value| Arc::new(value) as AnyValue)
          .map_err(QueryError::fetch)
      }
      .boxed()
    });

    let mut entries = self.entries();
    let entry = match entries.entry(key.clone()) {
      MapEntry::Occupied(occupied) => occupied.into_mut(),
      MapEntry::Vacant(vacant) => {
        self.emit(CacheEvent::Added(key.clone()));
        vacant.insert(Entry::new(self.next_id()))
      }
    };

    entry.fetcher = Some(fetcher);
    entry.subscribers += 1;
    // Voids any pending collection
    entry.gc_epoch += 1;

    if entry.in_flight.is_none() && entry.needs_fetch() {
      self.start_fetch(&key, entry);
    }

    debug!(%key, subscribers = entry.subscribers, "subscribed");
    let receiver = entry.state.subscribe();
    let entry_id = entry.id;
    drop(entries);

    QueryHandle::new(self.clone(), key, entry_id, receiver)
  }

  /// Drop a subscription. Equivalent to dropping the handle.
  pub fn unsubscribe<T>(&self, handle: QueryHandle<T>) {
    drop(handle);
  }

  /// Mark every entry under `prefix` stale and reload the ones somebody is
  /// watching. Returns how many entries matched.
  pub fn invalidate(&self, prefix: &QueryKey) -> usize {
    let mut entries = self.entries();
    let mut matched = 0;

    for (key, entry) in entries.iter_mut() {
      if !key.starts_with(prefix) {
        continue;
      }
      matched += 1;

      entry.state.send_modify(|state| {
        state.stale = true;
        state.status = QueryStatus::Loading;
      });

      if entry.in_flight.is_some() {
        entry.refetch_when_settled = true;
      } else if entry.subscribers > 0 {
        self.start_fetch(key, entry);
      }

      self.emit(CacheEvent::Invalidated(key.clone()));
    }

    debug!(%prefix, matched, "invalidated");
    matched
  }

  /// Reload one entry regardless of subscribers. Returns `false` when the
  /// key is not cached.
  pub fn refetch(&self, key: &QueryKey) -> bool {
    let mut entries = self.entries();
    let Some(entry) = entries.get_mut(key) else {
      return false;
    };

    if entry.in_flight.is_some() {
      entry.refetch_when_settled = true;
    } else {
      self.start_fetch(key, entry);
    }
    true
  }

  /// Last successful value for `key`, if it holds a `T`.
  pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
    self.query_state::<T>(key).and_then(|state| state.data)
  }

  pub fn query_state<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<QueryState<T>> {
    let entries = self.entries();
    entries
      .get(key)
      .map(|entry| QueryState::from_snapshot(&entry.state.borrow()))
  }

  pub fn subscriber_count(&self, key: &QueryKey) -> usize {
    self
      .entries()
      .get(key)
      .map(|entry| entry.subscribers)
      .unwrap_or(0)
  }

  pub fn len(&self) -> usize {
    self.entries().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries().is_empty()
  }

  /// Drop every entry under `prefix`. Live handles on removed entries stop
  /// receiving updates.
  pub fn remove(&self, prefix: &QueryKey) -> usize {
    let mut entries = self.entries();
    let removed: Vec<QueryKey> = entries
      .keys()
      .filter(|key| key.starts_with(prefix))
      .cloned()
      .collect();

    for key in &removed {
      entries.remove(key);
      self.emit(CacheEvent::Removed(key.clone()));
    }

    debug!(%prefix, removed = removed.len(), "removed entries");
    removed.len()
  }

  pub fn clear(&self) -> usize {
    self.remove(&QueryKey::root())
  }

  /// Cache-wide event stream.
  pub fn events(&self) -> broadcast::Receiver<CacheEvent> {
    self.inner.events.subscribe()
  }

  /// A mutation runner that invalidates through this cache.
  pub fn mutation(&self) -> Mutation {
    Mutation::new(self.clone())
  }

  pub(crate) fn release(&self, key: &QueryKey, entry_id: u64) {
    let mut entries = self.entries();
    let Some(entry) = entries.get_mut(key) else {
      return;
    };
    if entry.id != entry_id {
      return;
    }

    entry.subscribers = entry.subscribers.saturating_sub(1);
    debug!(%key, subscribers = entry.subscribers, "unsubscribed");

    if entry.subscribers == 0 {
      self.schedule_gc(key, entry);
    }
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
    // Entry updates are single assignments, so a poisoned map is still consistent
    self
      .inner
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  fn next_id(&self) -> u64 {
    self.inner.next_id.fetch_add(1, Ordering::Relaxed)
  }

  fn emit(&self, event: CacheEvent) {
    // No receivers is fine
    let _ = self.inner.events.send(event);
  }

  fn start_fetch(&self, key: &QueryKey, entry: &mut Entry) {
    let Some(fetcher) = entry.fetcher.clone() else {
      return;
    };

    // Nothing is marked in flight until the fetch function has returned
    let fetch = match std::panic::catch_unwind(AssertUnwindSafe(|| fetcher())) {
      Ok(fetch) => fetch,
      Err(_) => {
        warn!(%key, "fetch function panicked");
        entry.refetch_when_settled = false;
        entry.state.send_modify(|state| {
          state.status = QueryStatus::Error;
          state.error = Some(QueryError::Cancelled);
          state.fetching = false;
        });
        self.emit(CacheEvent::Updated {
          key: key.clone(),
          status: QueryStatus::Error,
        });
        return;
      }
    };

    let fetch_id = self.next_id();
    entry.in_flight = Some(fetch_id);
    entry.refetch_when_settled = false;
    entry.state.send_modify(|state| {
      state.status = QueryStatus::Loading;
      state.fetching = true;
    });
    debug!(%key, fetch_id, "fetch started");

    let fetch = AssertUnwindSafe(fetch).catch_unwind();
    let timeout = self.inner.config.fetch_timeout;
    let client = self.clone();
    let key = key.clone();

    tokio::spawn(async move {
      let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, fetch).await {
          Ok(outcome) => outcome,
          Err(_) => Ok(Err(QueryError::Timeout(limit))),
        },
        None => fetch.await,
      };
      let result = outcome.unwrap_or(Err(QueryError::Cancelled));
      client.settle(&key, fetch_id, result);
    });
  }

  fn settle(&self, key: &QueryKey, fetch_id: u64, result: Result<AnyValue, QueryError>) {
    let mut entries = self.entries();
    let Some(entry) = entries.get_mut(key) else {
      debug!(%key, fetch_id, "entry removed before fetch settled");
      return;
    };
    if entry.in_flight != Some(fetch_id) {
      return;
    }
    entry.in_flight = None;

    if entry.refetch_when_settled {
      debug!(%key, fetch_id, "discarding result of invalidated fetch");
      if entry.subscribers > 0 {
        self.start_fetch(key, entry);
      } else {
        entry.state.send_modify(|state| state.fetching = false);
        self.schedule_gc(key, entry);
      }
      return;
    }

    let status = match result {
      Ok(value) => {
        debug!(%key, fetch_id, "fetch succeeded");
        entry.state.send_modify(|state| {
          state.status = QueryStatus::Success;
          state.value = Some(value);
          state.error = None;
          state.stale = false;
          state.fetching = false;
          state.updated_at = Some(Utc::now());
        });
        QueryStatus::Success
      }
      Err(error) => {
        warn!(%key, fetch_id, %error, "fetch failed");
        entry.state.send_modify(|state| {
          state.status = QueryStatus::Error;
          state.error = Some(error);
          state.fetching = false;
        });
        QueryStatus::Error
      }
    };
    self.emit(CacheEvent::Updated {
      key: key.clone(),
      status,
    });

    if entry.subscribers == 0 {
      self.schedule_gc(key, entry);
    }
  }

  fn schedule_gc(&self, key: &QueryKey, entry: &mut Entry) {
    let Some(delay) = self.inner.config.gc_time else {
      return;
    };
    if entry.subscribers > 0 || entry.in_flight.is_some() {
      return;
    }
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
      return;
    };

    entry.gc_epoch += 1;
    let epoch = entry.gc_epoch;
    let inner = Arc::downgrade(&self.inner);
    let key = key.clone();

    runtime.spawn(async move {
      tokio::time::sleep(delay).await;
      if let Some(inner) = inner.upgrade() {
        QueryClient { inner }.collect(&key, epoch);
      }
    });
  }

  fn collect(&self, key: &QueryKey, epoch: u64) {
    let mut entries = self.entries();
    let expired = entries.get(key).is_some_and(|entry| {
      entry.gc_epoch == epoch && entry.subscribers == 0 && entry.in_flight.is_none()
    });

    if expired {
      entries.remove(key);
      debug!(%key, "collected unused entry");
      self.emit(CacheEvent::Removed(key.clone()));
    }
  }
}

impl Default for QueryClient {
  fn default() -> Self {
    Self::new(QueryConfig::default())
  }
}

impl std::fmt::Debug for QueryClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryClient")
      .field("config", &self.inner.config)
      .field("entries", &self.len())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;
  use std::time::Duration;
  use tokio::sync::Semaphore;

  #[derive(Debug, Clone, thiserror::Error)]
  #[error("server said no")]
  struct ServerSaidNo;

  fn annotations_key(document: &str) -> QueryKey {
    QueryKey::from(["document", document, "annotations"])
  }

  /// Fetcher that counts calls and returns the call number.
  fn counting(
    calls: &Arc<AtomicUsize>,
  ) -> impl Fn() -> futures::future::Ready<Result<usize, ServerSaidNo>> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move || futures::future::ready(Ok(calls.fetch_add(1, Ordering::SeqCst) + 1))
  }

  /// Fetcher that counts calls and waits for a permit before resolving.
  fn gated(
    calls: &Arc<AtomicUsize>,
    gate: &Arc<Semaphore>,
  ) -> impl Fn() -> BoxFuture<'static, Result<usize, ServerSaidNo>> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    let gate = Arc::clone(gate);
    move || {
      let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
      let gate = Arc::clone(&gate);
      async move {
        gate.acquire().await.unwrap().forget();
        Ok(call)
      }
      .boxed()
    }
  }

  #[tokio::test]
  async fn test_first_subscribe_loads_then_succeeds() {
    let client = QueryClient::default();
    let mut handle = client.subscribe(annotations_key("D1"), || async {
      Ok::<_, ServerSaidNo>(Vec::<String>::new())
    });

    assert_eq!(handle.status(), QueryStatus::Loading);
    assert!(handle.is_loading());

    let state = handle.settled().await;
    assert_eq!(state.status, QueryStatus::Success);
    assert_eq!(state.data.as_deref(), Some(&Vec::new()));
    assert!(state.error.is_none());
  }

  #[tokio::test]
  async fn test_concurrent_subscribers_share_one_fetch() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));

    let mut first = client.subscribe(annotations_key("D1"), gated(&calls, &gate));
    let mut second = client.subscribe(annotations_key("D1"), gated(&calls, &gate));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.subscriber_count(&annotations_key("D1")), 2);

    gate.add_permits(1);
    assert_eq!(first.settled().await.data.as_deref(), Some(&1));
    assert_eq!(second.settled().await.data.as_deref(), Some(&1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_cached_success_is_served_without_fetching() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handle = client.subscribe(annotations_key("D1"), counting(&calls));
    handle.settled().await;
    drop(handle);

    let again = client.subscribe(annotations_key("D1"), counting(&calls));
    assert_eq!(again.status(), QueryStatus::Success);
    assert_eq!(again.data().as_deref(), Some(&1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_different_keys_fetch_separately() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut d1 = client.subscribe(annotations_key("D1"), counting(&calls));
    let mut d2 = client.subscribe(annotations_key("D2"), counting(&calls));
    d1.settled().await;
    d2.settled().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(client.len(), 2);
  }

  #[tokio::test]
  async fn test_invalidate_prefix_refetches_subscribed_entries_once() {
    let client = QueryClient::default();
    let d1_calls = Arc::new(AtomicUsize::new(0));
    let d1_meta_calls = Arc::new(AtomicUsize::new(0));
    let d2_calls = Arc::new(AtomicUsize::new(0));

    let mut d1 = client.subscribe(annotations_key("D1"), counting(&d1_calls));
    let mut d1_meta = client.subscribe(
      QueryKey::from(["document", "D1", "meta"]),
      counting(&d1_meta_calls),
    );
    let mut d2 = client.subscribe(annotations_key("D2"), counting(&d2_calls));
    d1.settled().await;
    d1_meta.settled().await;
    d2.settled().await;

    let matched = client.invalidate(&QueryKey::from(["document", "D1"]));
    assert_eq!(matched, 2);
    assert_eq!(d1.status(), QueryStatus::Loading);
    assert_eq!(d1_meta.status(), QueryStatus::Loading);
    assert_eq!(d2.status(), QueryStatus::Success);

    assert_eq!(d1.settled().await.data.as_deref(), Some(&2));
    assert_eq!(d1_meta.settled().await.data.as_deref(), Some(&2));
    assert_eq!(d1_calls.load(Ordering::SeqCst), 2);
    assert_eq!(d1_meta_calls.load(Ordering::SeqCst), 2);
    assert_eq!(d2_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_refetch_after_invalidate_keeps_previous_value_visible() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(1));

    let mut handle = client.subscribe(annotations_key("D1"), gated(&calls, &gate));
    handle.settled().await;

    client.invalidate(&annotations_key("D1"));
    assert!(handle.is_fetching());
    assert!(!handle.is_loading());
    assert_eq!(handle.data().as_deref(), Some(&1));

    gate.add_permits(1);
    assert_eq!(handle.settled().await.data.as_deref(), Some(&2));
  }

  #[tokio::test]
  async fn test_invalidate_without_subscribers_marks_stale_only() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handle = client.subscribe(annotations_key("D1"), counting(&calls));
    handle.settled().await;
    client.unsubscribe(handle);

    client.invalidate(&annotations_key("D1"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let state = client
      .query_state::<usize>(&annotations_key("D1"))
      .unwrap();
    assert!(state.is_stale);
    assert_eq!(state.status, QueryStatus::Loading);
    assert!(!state.is_fetching);

    // Next subscriber picks up the pending reload
    let mut again = client.subscribe(annotations_key("D1"), counting(&calls));
    assert_eq!(again.settled().await.data.as_deref(), Some(&2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_failed_fetch_keeps_last_good_value() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let fetch_calls = Arc::clone(&calls);

    let mut handle = client.subscribe(annotations_key("D1"), move || {
      let call = fetch_calls.fetch_add(1, Ordering::SeqCst);
      async move {
        if call == 0 {
          Ok(vec!["first".to_string()])
        } else {
          Err(ServerSaidNo)
        }
      }
    });
    handle.settled().await;

    client.invalidate(&annotations_key("D1"));
    let state = handle.settled().await;

    assert_eq!(state.status, QueryStatus::Error);
    assert_eq!(state.data.as_deref(), Some(&vec!["first".to_string()]));
    let error = state.error.unwrap();
    assert!(error.downcast_ref::<ServerSaidNo>().is_some());
  }

  #[tokio::test]
  async fn test_cache_stays_usable_after_failures() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let fetch_calls = Arc::clone(&calls);

    let fetch = move || {
      let call = fetch_calls.fetch_add(1, Ordering::SeqCst);
      async move {
        if call < 3 {
          Err(ServerSaidNo)
        } else {
          Ok(call)
        }
      }
    };

    let mut handle = client.subscribe(annotations_key("D1"), fetch);
    for _ in 0..2 {
      assert!(handle.settled().await.is_error());
      client.refetch(&annotations_key("D1"));
    }
    assert!(handle.settled().await.is_error());

    client.refetch(&annotations_key("D1"));
    let state = handle.settled().await;
    assert!(state.is_success());
    assert_eq!(state.data.as_deref(), Some(&3));
    assert!(state.error.is_none());
  }

  #[tokio::test]
  async fn test_resubscribe_mid_fetch_joins_running_fetch() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));

    let handle = client.subscribe(annotations_key("D1"), gated(&calls, &gate));
    drop(handle);
    assert_eq!(client.subscriber_count(&annotations_key("D1")), 0);

    let mut again = client.subscribe(annotations_key("D1"), gated(&calls, &gate));
    gate.add_permits(1);

    assert_eq!(again.settled().await.data.as_deref(), Some(&1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_result_is_stored_after_last_subscriber_leaves() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));
    let mut events = client.events();

    let handle = client.subscribe(annotations_key("D1"), gated(&calls, &gate));
    drop(handle);
    gate.add_permits(1);

    loop {
      if let CacheEvent::Updated { status, .. } = events.recv().await.unwrap() {
        assert_eq!(status, QueryStatus::Success);
        break;
      }
    }
    assert_eq!(
      client.get_query_data::<usize>(&annotations_key("D1")).as_deref(),
      Some(&1)
    );
  }

  #[tokio::test]
  async fn test_invalidate_during_fetch_discards_old_result() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));

    let mut handle = client.subscribe(annotations_key("D1"), gated(&calls, &gate));
    client.invalidate(&annotations_key("D1"));
    // Still only the original fetch in flight
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    gate.add_permits(2);
    let state = handle.settled().await;
    assert_eq!(state.data.as_deref(), Some(&2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!state.is_stale);
  }

  #[tokio::test]
  async fn test_hung_fetch_times_out() {
    let client = QueryClient::new(
      QueryConfig::default().with_fetch_timeout(Some(Duration::from_millis(20))),
    );

    let mut handle = client.subscribe(annotations_key("D1"), || async {
      tokio::time::sleep(Duration::from_secs(30)).await;
      Ok::<_, ServerSaidNo>(1)
    });

    let state = handle.settled().await;
    assert!(state.is_error());
    assert!(matches!(state.error, Some(QueryError::Timeout(_))));
  }

  #[tokio::test]
  async fn test_panicking_fetch_settles_as_cancelled() {
    let client = QueryClient::default();

    let mut handle = client.subscribe(annotations_key("D1"), || async {
      if true {
        panic!("fetch blew up");
      }
      Ok::<usize, ServerSaidNo>(1)
    });

    let state = handle.settled().await;
    assert!(matches!(state.error, Some(QueryError::Cancelled)));
  }

  #[tokio::test]
  async fn test_fetch_function_panic_leaves_entry_usable() {
    let client = QueryClient::new(
      QueryConfig::default().with_fetch_timeout(Some(Duration::from_millis(50))),
    );
    let calls = Arc::new(AtomicUsize::new(0));

    let mut broken = client.subscribe(annotations_key("D1"), || -> futures::future::Ready<
      Result<usize, ServerSaidNo>,
    > { panic!("could not build request") });
    let state = broken.settled().await;
    assert!(matches!(state.error, Some(QueryError::Cancelled)));
    assert!(!state.is_fetching);
    drop(broken);
    assert_eq!(client.subscriber_count(&annotations_key("D1")), 0);

    let mut handle = client.subscribe(annotations_key("D1"), counting(&calls));
    let state = tokio::time::timeout(Duration::from_millis(500), handle.settled())
      .await
      .unwrap();
    assert_eq!(state.data.as_deref(), Some(&1));
    assert!(state.error.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_gc_removes_unused_entries_after_delay() {
    let client =
      QueryClient::new(QueryConfig::default().with_gc_time(Some(Duration::from_millis(20))));
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handle = client.subscribe(annotations_key("D1"), counting(&calls));
    handle.settled().await;
    drop(handle);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client.is_empty());
  }

  #[tokio::test]
  async fn test_gc_spares_resubscribed_entries() {
    let client =
      QueryClient::new(QueryConfig::default().with_gc_time(Some(Duration::from_millis(20))));
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handle = client.subscribe(annotations_key("D1"), counting(&calls));
    handle.settled().await;
    drop(handle);
    let _kept = client.subscribe(annotations_key("D1"), counting(&calls));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_entries_are_kept_without_gc_time() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handle = client.subscribe(annotations_key("D1"), counting(&calls));
    handle.settled().await;
    drop(handle);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(client.len(), 1);
  }

  #[tokio::test]
  async fn test_remove_ends_handles_and_ignores_stale_release() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut old = client.subscribe(annotations_key("D1"), counting(&calls));
    old.settled().await;
    assert_eq!(client.remove(&QueryKey::from(["document"])), 1);
    assert!(!old.changed().await);

    let fresh = client.subscribe(annotations_key("D1"), counting(&calls));
    drop(old);
    assert_eq!(client.subscriber_count(fresh.key()), 1);
  }

  #[tokio::test]
  async fn test_events_report_lifecycle() {
    let client = QueryClient::default();
    let mut events = client.events();

    let mut handle = client.subscribe(annotations_key("D1"), || async {
      Ok::<_, ServerSaidNo>(0usize)
    });
    handle.settled().await;
    client.invalidate(&annotations_key("D1"));

    assert_eq!(
      events.recv().await.unwrap(),
      CacheEvent::Added(annotations_key("D1"))
    );
    assert_eq!(
      events.recv().await.unwrap(),
      CacheEvent::Updated {
        key: annotations_key("D1"),
        status: QueryStatus::Success
      }
    );
    assert_eq!(
      events.recv().await.unwrap(),
      CacheEvent::Invalidated(annotations_key("D1"))
    );
  }
}
