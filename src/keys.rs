//! Cache keys for every resource family.
//!
//! All keys are built here so that two call sites asking for the same
//! resource always land on the same entry. Collections owned by a document
//! sit under `["document", id]`, per-user collections under `["user", id]`.

use crate::query::QueryKey;

/// Every documents query (listings and details).
pub fn documents_root() -> QueryKey {
  QueryKey::from(["documents"])
}

/// Document listing filtered by `search`.
///
/// The search text is normalised so equivalent searches share one entry, and
/// it is always present as the trailing token so an empty search cannot
/// collide with a filtered one.
pub fn document_list(search: &str) -> QueryKey {
  documents_root().with("list").with(normalize_search(search))
}

pub fn document_detail(document_id: &str) -> QueryKey {
  documents_root().with("detail").with(document_id)
}

/// Everything cached for one document.
pub fn document_scope(document_id: &str) -> QueryKey {
  QueryKey::from(["document", document_id])
}

pub fn annotations(document_id: &str) -> QueryKey {
  document_scope(document_id).with("annotations")
}

/// Everything cached for one user.
pub fn user_scope(user_id: &str) -> QueryKey {
  QueryKey::from(["user", user_id])
}

pub fn signatures(user_id: &str) -> QueryKey {
  user_scope(user_id).with("signatures")
}

pub fn stamps(user_id: &str) -> QueryKey {
  user_scope(user_id).with("stamps")
}

/// Normalize search text for consistent keys.
/// Trims, collapses inner whitespace and lowercases.
pub fn normalize_search(search: &str) -> String {
  search
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}
