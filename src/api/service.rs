//! The remote document service as seen by the rest of the crate.

use async_trait::async_trait;

use super::error::ApiError;
use super::types::{
  Annotation, Document, NewAnnotation, NewSignature, NewStamp, SavedSignature, SavedStamp,
};

/// Operations of the document service.
///
/// Implementations must report every non-success answer as an error; the
/// mutation runner relies on that to decide whether to invalidate.
#[async_trait]
pub trait DocumentService: Send + Sync {
  /// Documents whose name or description matches `search`; all when empty.
  async fn list_documents(&self, search: &str) -> Result<Vec<Document>, ApiError>;

  async fn get_document(&self, document_id: &str) -> Result<Document, ApiError>;

  async fn list_annotations(&self, document_id: &str) -> Result<Vec<Annotation>, ApiError>;

  async fn create_annotation(&self, annotation: &NewAnnotation) -> Result<Annotation, ApiError>;

  async fn delete_annotation(&self, document_id: &str, annotation_id: &str)
    -> Result<(), ApiError>;

  async fn list_signatures(&self) -> Result<Vec<SavedSignature>, ApiError>;

  async fn create_signature(&self, signature: &NewSignature) -> Result<SavedSignature, ApiError>;

  async fn delete_signature(&self, signature_id: &str) -> Result<(), ApiError>;

  async fn list_stamps(&self) -> Result<Vec<SavedStamp>, ApiError>;

  async fn create_stamp(&self, stamp: &NewStamp) -> Result<SavedStamp, ApiError>;

  async fn delete_stamp(&self, stamp_id: &str) -> Result<(), ApiError>;
}
