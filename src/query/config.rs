//! Query cache tuning

use std::time::Duration;

/// Configuration for the query cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
  /// A fetch running longer than this settles as a timeout error.
  /// `None` lets fetches run indefinitely.
  pub fetch_timeout: Option<Duration>,
  /// How long an entry with no subscribers is kept before it is dropped.
  /// `None` keeps entries for the lifetime of the cache.
  pub gc_time: Option<Duration>,
}

impl Default for QueryConfig {
  fn default() -> Self {
    Self {
      fetch_timeout: Some(Duration::from_secs(30)),
      gc_time: None,
    }
  }
}

impl QueryConfig {
  pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.fetch_timeout = timeout;
    self
  }

  pub fn with_gc_time(mut self, gc_time: Option<Duration>) -> Self {
    self.gc_time = gc_time;
    self
  }
}
