//! Async query cache for remote data.
//!
//! Inspired by TanStack Query: resources are addressed by structural
//! [`QueryKey`]s, loaded once per key no matter how many subscribers ask for
//! them, and reloaded when a [`Mutation`] invalidates their key prefix.
//!
//! # Example
//!
//! ```ignore
//! let client = QueryClient::new(QueryConfig::default());
//!
//! let service = service.clone();
//! let mut handle = client.subscribe(keys::annotations("D1"), move || {
//!     let service = service.clone();
//!     async move { service.list_annotations("D1").await }
//! });
//!
//! // Somewhere else, after a write
//! client.mutation().run(service.delete_annotation("D1", "a1"), &[keys::annotations("D1")]).await?;
//!
//! // The handle reloads on its own
//! let state = handle.settled().await;
//! ```

mod binder;
mod client;
mod config;
mod handle;
mod key;
mod mutation;
mod state;

pub use binder::FetchBinder;
pub use client::QueryClient;
pub use config::QueryConfig;
pub use handle::QueryHandle;
pub use key::QueryKey;
pub use mutation::{Mutation, MutationState, MutationStatus};
pub use state::{CacheEvent, QueryError, QueryState, QueryStatus};
