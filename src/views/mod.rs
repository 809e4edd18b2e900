//! Per-resource bindings over the query cache.
//!
//! Each view owns one [`FetchBinder`](crate::query::FetchBinder) subscription
//! and, where the resource is writable, a [`Mutation`](crate::query::Mutation)
//! that invalidates the view's key family once a write is acknowledged.

mod annotations;
mod documents;
mod signatures;
mod stamps;

pub use annotations::AnnotationsView;
pub use documents::{DocumentView, DocumentsView};
pub use signatures::SignaturesView;
pub use stamps::StampsView;
