use std::sync::Arc;
use tracing::{info, warn};

use crate::api::types::Document;
use crate::api::{ApiError, DocumentService};
use crate::db::Catalog;
use crate::keys;
use crate::query::{FetchBinder, QueryClient, QueryError, QueryState};

/// Document listing filtered by a search string.
///
/// With a catalog attached, every successful listing is written through to
/// it, and a listing that fails because the service is unreachable is served
/// from the last stored copy instead. Server and validation errors are never
/// masked this way.
pub struct DocumentsView {
  binder: FetchBinder<String, Vec<Document>, ApiError>,
}

impl DocumentsView {
  pub fn new(
    client: &QueryClient,
    service: Arc<dyn DocumentService>,
    catalog: Option<Arc<Catalog>>,
    search: impl Into<String>,
  ) -> Self {
    let binder = FetchBinder::new(
      client.clone(),
      search.into(),
      |search: &String| keys::document_list(search),
      move |search: String| {
        let service = Arc::clone(&service);
        let catalog = catalog.clone();
        async move { load_listing(service.as_ref(), catalog.as_deref(), &search).await }
      },
    );
    Self { binder }
  }

  pub fn search(&self) -> &str {
    self.binder.params()
  }

  /// Change the filter. Returns `true` when it maps to a different entry.
  pub fn set_search(&mut self, search: impl Into<String>) -> bool {
    self.binder.set_params(search.into())
  }

  pub fn data(&self) -> Arc<Vec<Document>> {
    self.binder.data()
  }

  pub fn is_loading(&self) -> bool {
    self.binder.is_loading()
  }

  pub fn error(&self) -> Option<QueryError> {
    self.binder.error()
  }

  pub fn refetch(&self) -> bool {
    self.binder.refetch()
  }

  pub async fn changed(&mut self) -> bool {
    self.binder.changed().await
  }

  pub async fn settled(&mut self) -> QueryState<Vec<Document>> {
    self.binder.settled().await
  }
}

/// A single document. Loads as `None` when the service reports it missing.
pub struct DocumentView {
  binder: FetchBinder<String, Option<Document>, ApiError>,
}

impl DocumentView {
  pub fn new(
    client: &QueryClient,
    service: Arc<dyn DocumentService>,
    catalog: Option<Arc<Catalog>>,
    document_id: impl Into<String>,
  ) -> Self {
    let binder = FetchBinder::new(
      client.clone(),
      document_id.into(),
      |document_id: &String| keys::document_detail(document_id),
      move |document_id: String| {
        let service = Arc::clone(&service);
        let catalog = catalog.clone();
        async move { load_document(service.as_ref(), catalog.as_deref(), &document_id).await }
      },
    );
    Self { binder }
  }

  pub fn document_id(&self) -> &str {
    self.binder.params()
  }

  pub fn set_document(&mut self, document_id: impl Into<String>) -> bool {
    self.binder.set_params(document_id.into())
  }

  pub fn data(&self) -> Option<Document> {
    self.binder.data().as_ref().clone()
  }

  pub fn is_loading(&self) -> bool {
    self.binder.is_loading()
  }

  pub fn error(&self) -> Option<QueryError> {
    self.binder.error()
  }

  pub async fn settled(&mut self) -> QueryState<Option<Document>> {
    self.binder.settled().await
  }
}

async fn load_listing(
  service: &dyn DocumentService,
  catalog: Option<&Catalog>,
  search: &str,
) -> Result<Vec<Document>, ApiError> {
  match service.list_documents(search).await {
    Ok(documents) => {
      if let Some(catalog) = catalog {
        if let Err(e) = catalog.store_listing(search, &documents) {
          warn!(error = %e, "failed to update document catalog");
        }
      }
      Ok(documents)
    }
    Err(error) if error.is_network() => {
      let stored = match catalog.map(|c| c.listing(search)) {
        Some(Ok(stored)) => stored,
        Some(Err(e)) => {
          warn!(error = %e, "failed to read document catalog");
          None
        }
        None => None,
      };
      match stored {
        Some(listing) => {
          info!(
            cached_at = %listing.cached_at,
            count = listing.documents.len(),
            "service unreachable, serving catalog listing"
          );
          Ok(listing.documents)
        }
        None => Err(error),
      }
    }
    Err(error) => Err(error),
  }
}

async fn load_document(
  service: &dyn DocumentService,
  catalog: Option<&Catalog>,
  document_id: &str,
) -> Result<Option<Document>, ApiError> {
  match service.get_document(document_id).await {
    Ok(document) => {
      if let Some(catalog) = catalog {
        if let Err(e) = catalog.store_document(&document) {
          warn!(error = %e, "failed to update document catalog");
        }
      }
      Ok(Some(document))
    }
    Err(error) if error.is_not_found() => Ok(None),
    Err(error) if error.is_network() => match catalog.map(|c| c.get_document(document_id)) {
      Some(Ok(Some(document))) => {
        info!(document_id, "service unreachable, serving catalog copy");
        Ok(Some(document))
      }
      Some(Err(e)) => {
        warn!(error = %e, "failed to read document catalog");
        Err(error)
      }
      _ => Err(error),
    },
    Err(error) => Err(error),
  }
}
