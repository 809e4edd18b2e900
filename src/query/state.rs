//! Query status, errors and the snapshots handed to observers.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use super::key::QueryKey;

/// Type-erased cached value.
pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;

/// The status of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  /// Entry exists but no fetch has started
  Idle,
  /// A fetch is running, or the entry was invalidated and waits for one
  Loading,
  /// The last fetch succeeded
  Success,
  /// The last fetch failed
  Error,
}

impl QueryStatus {
  pub fn is_settled(self) -> bool {
    matches!(self, QueryStatus::Success | QueryStatus::Error)
  }
}

/// Why a fetch did not produce a value.
///
/// Entries share one error between all their subscribers, so this type is
/// cheap to clone. The underlying fetch error is kept and can be recovered
/// with [`QueryError::downcast_ref`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
  #[error("{0}")]
  Fetch(Arc<dyn StdError + Send + Sync>),
  #[error("fetch timed out after {0:?}")]
  Timeout(Duration),
  #[error("fetch was cancelled before it completed")]
  Cancelled,
}

impl QueryError {
  pub fn fetch<E: StdError + Send + Sync + 'static>(error: E) -> Self {
    Self::Fetch(Arc::new(error))
  }

  /// Borrow the original fetch error as `E`, if that is what it was.
  pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
    match self {
      Self::Fetch(inner) => inner.downcast_ref::<E>(),
      _ => None,
    }
  }
}

/// What the cache publishes for one entry on every change.
#[derive(Debug, Clone)]
pub(crate) struct EntrySnapshot {
  pub status: QueryStatus,
  pub value: Option<AnyValue>,
  pub error: Option<QueryError>,
  pub stale: bool,
  pub fetching: bool,
  pub updated_at: Option<DateTime<Utc>>,
}

impl Default for EntrySnapshot {
  fn default() -> Self {
    Self {
      status: QueryStatus::Idle,
      value: None,
      error: None,
      stale: false,
      fetching: false,
      updated_at: None,
    }
  }
}

/// Typed view of one cache entry at a point in time.
#[derive(Debug)]
pub struct QueryState<T> {
  pub status: QueryStatus,
  /// Last successfully fetched value. Survives later failed fetches.
  pub data: Option<Arc<T>>,
  pub error: Option<QueryError>,
  /// Invalidated since the value was fetched
  pub is_stale: bool,
  /// A fetch for this entry is in flight
  pub is_fetching: bool,
  /// When `data` was fetched
  pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Clone for QueryState<T> {
  fn clone(&self) -> Self {
    Self {
      status: self.status,
      data: self.data.clone(),
      error: self.error.clone(),
      is_stale: self.is_stale,
      is_fetching: self.is_fetching,
      updated_at: self.updated_at,
    }
  }
}

impl<T: Send + Sync + 'static> QueryState<T> {
  pub(crate) fn from_snapshot(snapshot: &EntrySnapshot) -> Self {
    Self {
      status: snapshot.status,
      data: snapshot
        .value
        .clone()
        .and_then(|value| value.downcast::<T>().ok()),
      error: snapshot.error.clone(),
      is_stale: snapshot.stale,
      is_fetching: snapshot.fetching,
      updated_at: snapshot.updated_at,
    }
  }
}

impl<T> QueryState<T> {
  /// Loading with nothing to show yet. Refetches of an entry that already
  /// holds data do not count.
  pub fn is_loading(&self) -> bool {
    self.status == QueryStatus::Loading && self.data.is_none()
  }

  pub fn is_success(&self) -> bool {
    self.status == QueryStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == QueryStatus::Error
  }
}

/// Cache-wide notifications, independent of any single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
  Added(QueryKey),
  Updated { key: QueryKey, status: QueryStatus },
  Invalidated(QueryKey),
  Removed(QueryKey),
}
