use std::sync::Arc;

use crate::api::types::{require_id, Annotation, NewAnnotation};
use crate::api::{ApiError, DocumentService};
use crate::keys;
use crate::query::{FetchBinder, Mutation, MutationState, QueryClient, QueryError, QueryState};

/// Annotations of one document, with add and delete.
pub struct AnnotationsView {
  binder: FetchBinder<String, Vec<Annotation>, ApiError>,
  service: Arc<dyn DocumentService>,
  mutation: Mutation,
}

impl AnnotationsView {
  pub fn new(
    client: &QueryClient,
    service: Arc<dyn DocumentService>,
    document_id: impl Into<String>,
  ) -> Self {
    let fetch_service = Arc::clone(&service);
    let binder = FetchBinder::new(
      client.clone(),
      document_id.into(),
      |document_id: &String| keys::annotations(document_id),
      move |document_id: String| {
        let service = Arc::clone(&fetch_service);
        async move { service.list_annotations(&document_id).await }
      },
    );

    Self {
      binder,
      service,
      mutation: client.mutation(),
    }
  }

  pub fn document_id(&self) -> &str {
    self.binder.params()
  }

  /// Follow another document. Returns `true` when it differs.
  pub fn set_document(&mut self, document_id: impl Into<String>) -> bool {
    self.binder.set_params(document_id.into())
  }

  pub fn data(&self) -> Arc<Vec<Annotation>> {
    self.binder.data()
  }

  pub fn is_loading(&self) -> bool {
    self.binder.is_loading()
  }

  pub fn is_fetching(&self) -> bool {
    self.binder.is_fetching()
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

  pub async fn settled(&mut self) -> QueryState<Vec<Annotation>> {
    self.binder.settled().await
  }

  pub fn mutation_state(&self) -> MutationState {
    self.mutation.state()
  }

  /// Create an annotation on the document it names.
  pub async fn add(&self, annotation: NewAnnotation) -> Result<Annotation, ApiError> {
    let targets = [keys::annotations(&annotation.document_id)];
    self
      .mutation
      .run(
        async {
          annotation.validate()?;
          self.service.create_annotation(&annotation).await
        },
        &targets,
      )
      .await
  }

  /// Delete an annotation of the current document.
  pub async fn delete(&self, annotation_id: &str) -> Result<(), ApiError> {
    let document_id = self.document_id().to_string();
    let targets = [keys::annotations(&document_id)];
    self
      .mutation
      .run(
        async {
          require_id("annotation id", annotation_id)?;
          self
            .service
            .delete_annotation(&document_id, annotation_id)
            .await
        },
        &targets,
      )
      .await
  }
}
