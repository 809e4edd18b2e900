//! Pessimistic writes followed by cache invalidation.

use std::fmt::Display;
use std::future::Future;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::client::QueryClient;
use super::key::QueryKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
  Idle,
  Pending,
  Success,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationState {
  pub status: MutationStatus,
  /// Message of the last failure, cleared by the next success
  pub error: Option<String>,
}

impl Default for MutationState {
  fn default() -> Self {
    Self {
      status: MutationStatus::Idle,
      error: None,
    }
  }
}

/// Runs writes against the remote service and invalidates cache entries once
/// the write is acknowledged.
///
/// Nothing is written into the cache optimistically: affected entries only
/// change when their invalidation-triggered refetch completes. A failed write
/// leaves the cache exactly as it was.
pub struct Mutation {
  client: QueryClient,
  state: watch::Sender<MutationState>,
}

impl Mutation {
  pub fn new(client: QueryClient) -> Self {
    let (state, _) = watch::channel(MutationState::default());
    Self { client, state }
  }

  /// Await `write`, then invalidate every key in `targets` (as prefixes).
  pub async fn run<T, E, Fut>(&self, write: Fut, targets: &[QueryKey]) -> Result<T, E>
  where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
  {
    self.state.send_replace(MutationState {
      status: MutationStatus::Pending,
      error: None,
    });

    match write.await {
      Ok(value) => {
        for target in targets {
          self.client.invalidate(target);
        }
        debug!(targets = targets.len(), "mutation acknowledged");
        self.state.send_replace(MutationState {
          status: MutationStatus::Success,
          error: None,
        });
        Ok(value)
      }
      Err(error) => {
        warn!(%error, "mutation failed, cache left untouched");
        self.state.send_replace(MutationState {
          status: MutationStatus::Error,
          error: Some(error.to_string()),
        });
        Err(error)
      }
    }
  }

  pub fn state(&self) -> MutationState {
    self.state.borrow().clone()
  }

  /// Observe status changes, e.g. to show a "saving" indicator.
  pub fn watch(&self) -> watch::Receiver<MutationState> {
    self.state.subscribe()
  }
}
