//! In-memory document service for tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::error::ApiError;
use super::service::DocumentService;
use super::types::{
  Annotation, Document, NewAnnotation, NewSignature, NewStamp, SavedSignature, SavedStamp,
};

#[derive(Default)]
struct FakeState {
  documents: Vec<Document>,
  annotations: HashMap<String, Vec<Annotation>>,
  signatures: Vec<SavedSignature>,
  stamps: Vec<SavedStamp>,
  next_id: u64,
  read_failure: Option<ApiError>,
  write_failure: Option<ApiError>,
  calls: HashMap<&'static str, usize>,
}

impl FakeState {
  fn record(&mut self, operation: &'static str) {
    *self.calls.entry(operation).or_default() += 1;
  }

  fn read(&mut self, operation: &'static str) -> Result<(), ApiError> {
    self.record(operation);
    match &self.read_failure {
      Some(error) => Err(error.clone()),
      None => Ok(()),
    }
  }

  fn write(&mut self, operation: &'static str) -> Result<(), ApiError> {
    self.record(operation);
    match &self.write_failure {
      Some(error) => Err(error.clone()),
      None => Ok(()),
    }
  }

  fn next_id(&mut self, prefix: &str) -> String {
    self.next_id += 1;
    format!("{}{}", prefix, self.next_id)
  }
}

#[derive(Default)]
pub struct FakeDocumentService {
  state: Mutex<FakeState>,
}

pub fn document(id: &str, name: &str) -> Document {
  let created = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
  Document {
    id: id.to_string(),
    name: name.to_string(),
    description: None,
    file_size: "1536".to_string(),
    mime_type: "application/pdf".to_string(),
    url: format!("/files/{}", id),
    created_at: created,
    updated_at: created,
  }
}

pub fn server_error() -> ApiError {
  ApiError::Server {
    status: 500,
    message: "internal error".to_string(),
  }
}

impl FakeDocumentService {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_document(self, document: Document) -> Self {
    self.state.lock().unwrap().documents.push(document);
    self
  }

  pub fn fail_reads(&self, error: Option<ApiError>) {
    self.state.lock().unwrap().read_failure = error;
  }

  pub fn fail_writes(&self, error: Option<ApiError>) {
    self.state.lock().unwrap().write_failure = error;
  }

  pub fn calls(&self, operation: &str) -> usize {
    self
      .state
      .lock()
      .unwrap()
      .calls
      .get(operation)
      .copied()
      .unwrap_or(0)
  }
}

#[async_trait]
impl DocumentService for FakeDocumentService {
  async fn list_documents(&self, search: &str) -> Result<Vec<Document>, ApiError> {
    let mut state = self.state.lock().unwrap();
    state.read("list_documents")?;
    let search = search.trim().to_lowercase();
    Ok(
      state
        .documents
        .iter()
        .filter(|d| search.is_empty() || d.name.to_lowercase().contains(&search))
        .cloned()
        .collect(),
    )
  }

  async fn get_document(&self, document_id: &str) -> Result<Document, ApiError> {
    let mut state = self.state.lock().unwrap();
    state.read("get_document")?;
    state
      .documents
      .iter()
      .find(|d| d.id == document_id)
      .cloned()
      .ok_or(ApiError::Server {
        status: 404,
        message: "Not Found".to_string(),
      })
  }

  async fn list_annotations(&self, document_id: &str) -> Result<Vec<Annotation>, ApiError> {
    let mut state = self.state.lock().unwrap();
    state.read("list_annotations")?;
    Ok(
      state
        .annotations
        .get(document_id)
        .cloned()
        .unwrap_or_default(),
    )
  }

  async fn create_annotation(&self, annotation: &NewAnnotation) -> Result<Annotation, ApiError> {
    let mut state = self.state.lock().unwrap();
    state.write("create_annotation")?;
    let created = Annotation {
      id: state.next_id("a"),
      document_id: annotation.document_id.clone(),
      created_at: Utc::now(),
      kind: annotation.kind.clone(),
      page: annotation.page,
      text: annotation.text.clone(),
      extra: annotation.extra.clone(),
    };
    state
      .annotations
      .entry(annotation.document_id.clone())
      .or_default()
      .push(created.clone());
    Ok(created)
  }

  async fn delete_annotation(
    &self,
    document_id: &str,
    annotation_id: &str,
  ) -> Result<(), ApiError> {
    let mut state = self.state.lock().unwrap();
    state.write("delete_annotation")?;
    if let Some(list) = state.annotations.get_mut(document_id) {
      list.retain(|a| a.id != annotation_id);
    }
    Ok(())
  }

  async fn list_signatures(&self) -> Result<Vec<SavedSignature>, ApiError> {
    let mut state = self.state.lock().unwrap();
    state.read("list_signatures")?;
    Ok(state.signatures.clone())
  }

  async fn create_signature(&self, signature: &NewSignature) -> Result<SavedSignature, ApiError> {
    let mut state = self.state.lock().unwrap();
    state.write("create_signature")?;
    let created = SavedSignature {
      id: state.next_id("s"),
      data_url: signature.data_url.clone(),
      created_at: Some(Utc::now()),
    };
    state.signatures.push(created.clone());
    Ok(created)
  }

  async fn delete_signature(&self, signature_id: &str) -> Result<(), ApiError> {
    let mut state = self.state.lock().unwrap();
    state.write("delete_signature")?;
    state.signatures.retain(|s| s.id != signature_id);
    Ok(())
  }

  async fn list_stamps(&self) -> Result<Vec<SavedStamp>, ApiError> {
    let mut state = self.state.lock().unwrap();
    state.read("list_stamps")?;
    Ok(state.stamps.clone())
  }

  async fn create_stamp(&self, stamp: &NewStamp) -> Result<SavedStamp, ApiError> {
    let mut state = self.state.lock().unwrap();
    state.write("create_stamp")?;
    let created = SavedStamp {
      id: state.next_id("t"),
      stamp_type: stamp.stamp_type.clone(),
      preview: stamp.preview.clone(),
      created_at: Some(Utc::now()),
    };
    state.stamps.push(created.clone());
    Ok(created)
  }

  async fn delete_stamp(&self, stamp_id: &str) -> Result<(), ApiError> {
    let mut state = self.state.lock().unwrap();
    state.write("delete_stamp")?;
    state.stamps.retain(|s| s.id != stamp_id);
    Ok(())
  }
}
