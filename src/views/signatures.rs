use std::sync::Arc;

use crate::api::types::{require_id, NewSignature, SavedSignature};
use crate::api::{ApiError, DocumentService};
use crate::keys;
use crate::query::{FetchBinder, Mutation, MutationState, QueryClient, QueryError, QueryState};

/// Signatures saved by the signed-in user.
///
/// The service answers for whoever the session belongs to; the user id only
/// scopes the cache entry so that switching accounts never shows another
/// user's signatures.
pub struct SignaturesView {
  binder: FetchBinder<String, Vec<SavedSignature>, ApiError>,
  service: Arc<dyn DocumentService>,
  mutation: Mutation,
}

impl SignaturesView {
  pub fn new(
    client: &QueryClient,
    service: Arc<dyn DocumentService>,
    user_id: impl Into<String>,
  ) -> Self {
    let fetch_service = Arc::clone(&service);
    let binder = FetchBinder::new(
      client.clone(),
      user_id.into(),
      |user_id: &String| keys::signatures(user_id),
      move |_user_id: String| {
        let service = Arc::clone(&fetch_service);
        async move { service.list_signatures().await }
      },
    );

    Self {
      binder,
      service,
      mutation: client.mutation(),
    }
  }

  pub fn user_id(&self) -> &str {
    self.binder.params()
  }

  pub fn set_user(&mut self, user_id: impl Into<String>) -> bool {
    self.binder.set_params(user_id.into())
  }

  pub fn data(&self) -> Arc<Vec<SavedSignature>> {
    self.binder.data()
  }

  pub fn is_loading(&self) -> bool {
    self.binder.is_loading()
  }

  pub fn error(&self) -> Option<QueryError> {
    self.binder.error()
  }

  pub async fn settled(&mut self) -> QueryState<Vec<SavedSignature>> {
    self.binder.settled().await
  }

  pub fn mutation_state(&self) -> MutationState {
    self.mutation.state()
  }

  pub async fn add(&self, signature: NewSignature) -> Result<SavedSignature, ApiError> {
    let targets = [keys::signatures(self.user_id())];
    self
      .mutation
      .run(
        async {
          signature.validate()?;
          self.service.create_signature(&signature).await
        },
        &targets,
      )
      .await
  }

  pub async fn delete(&self, signature_id: &str) -> Result<(), ApiError> {
    let targets = [keys::signatures(self.user_id())];
    self
      .mutation
      .run(
        async {
          require_id("signature id", signature_id)?;
          self.service.delete_signature(signature_id).await
        },
        &targets,
      )
      .await
  }
}
