use std::sync::Arc;

use crate::api::types::{require_id, NewStamp, SavedStamp};
use crate::api::{ApiError, DocumentService};
use crate::keys;
use crate::query::{FetchBinder, Mutation, MutationState, QueryClient, QueryError, QueryState};

/// Stamps saved by the signed-in user, keyed like [`super::SignaturesView`].
pub struct StampsView {
  binder: FetchBinder<String, Vec<SavedStamp>, ApiError>,
  service: Arc<dyn DocumentService>,
  mutation: Mutation,
}

impl StampsView {
  pub fn new(
    client: &QueryClient,
    service: Arc<dyn DocumentService>,
    user_id: impl Into<String>,
  ) -> Self {
    let fetch_service = Arc::clone(&service);
    let binder = FetchBinder::new(
      client.clone(),
      user_id.into(),
      |user_id: &String| keys::stamps(user_id),
      move |_user_id: String| {
        let service = Arc::clone(&fetch_service);
        async move { service.list_stamps().await }
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

  pub fn data(&self) -> Arc<Vec<SavedStamp>> {
    self.binder.data()
  }

  pub fn is_loading(&self) -> bool {
    self.binder.is_loading()
  }

  pub fn error(&self) -> Option<QueryError> {
    self.binder.error()
  }

  pub async fn settled(&mut self) -> QueryState<Vec<SavedStamp>> {
    self.binder.settled().await
  }

  pub fn mutation_state(&self) -> MutationState {
    self.mutation.state()
  }

  pub async fn add(&self, stamp: NewStamp) -> Result<SavedStamp, ApiError> {
    let targets = [keys::stamps(self.user_id())];
    self
      .mutation
      .run(
        async {
          stamp.validate()?;
          self.service.create_stamp(&stamp).await
        },
        &targets,
      )
      .await
  }

  pub async fn delete(&self, stamp_id: &str) -> Result<(), ApiError> {
    let targets = [keys::stamps(self.user_id())];
    self
      .mutation
      .run(
        async {
          require_id("stamp id", stamp_id)?;
          self.service.delete_stamp(stamp_id).await
        },
        &targets,
      )
      .await
  }
}
