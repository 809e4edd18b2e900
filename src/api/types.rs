use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ApiError;

/// Stored document metadata. The binary content lives behind `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
  pub id: String,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  /// Size in bytes, as text
  pub file_size: String,
  pub mime_type: String,
  pub url: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Document {
  pub fn file_size_bytes(&self) -> Option<u64> {
    self.file_size.trim().parse().ok()
  }
}

fn default_annotation_kind() -> String {
  "note".to_string()
}

/// An annotation placed on a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
  pub id: String,
  pub document_id: String,
  pub created_at: DateTime<Utc>,
  #[serde(default = "default_annotation_kind")]
  pub kind: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub page: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub text: Option<String>,
  /// Kind-specific fields (position, colour, signature reference...)
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Body of an annotation create request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnnotation {
  pub document_id: String,
  #[serde(default = "default_annotation_kind")]
  pub kind: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub page: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub text: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl NewAnnotation {
  /// A plain text note on a document
  pub fn note(document_id: impl Into<String>, text: impl Into<String>) -> Self {
    Self {
      document_id: document_id.into(),
      kind: default_annotation_kind(),
      page: None,
      text: Some(text.into()),
      extra: Map::new(),
    }
  }

  pub fn on_page(mut self, page: u32) -> Self {
    self.page = Some(page);
    self
  }

  pub fn validate(&self) -> Result<(), ApiError> {
    require_id("document id", &self.document_id)?;
    if self.kind.trim().is_empty() {
      return Err(ApiError::validation("annotation kind must not be empty"));
    }
    if self.page == Some(0) {
      return Err(ApiError::validation("pages are numbered from 1"));
    }
    Ok(())
  }
}

/// A signature image saved for reuse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSignature {
  pub id: String,
  pub data_url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSignature {
  pub data_url: String,
}

impl NewSignature {
  pub fn validate(&self) -> Result<(), ApiError> {
    validate_image_data_url(&self.data_url)
  }
}

/// A stamp saved for reuse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedStamp {
  pub id: String,
  #[serde(rename = "type")]
  pub stamp_type: String,
  pub preview: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStamp {
  #[serde(rename = "type")]
  pub stamp_type: String,
  pub preview: String,
}

impl NewStamp {
  pub fn validate(&self) -> Result<(), ApiError> {
    if self.stamp_type.trim().is_empty() {
      return Err(ApiError::validation("stamp type must not be empty"));
    }
    validate_image_data_url(&self.preview)
  }
}

/// Authenticated session returned by login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
  pub token: String,
  pub user_id: String,
}

pub(crate) fn require_id(what: &str, id: &str) -> Result<(), ApiError> {
  if id.trim().is_empty() {
    return Err(ApiError::validation(format!("{} must not be empty", what)));
  }
  Ok(())
}

fn validate_image_data_url(data_url: &str) -> Result<(), ApiError> {
  let Some(rest) = data_url.strip_prefix("data:image/") else {
    return Err(ApiError::validation("expected a data:image/... URL"));
  };
  match rest.split_once(',') {
    Some((_, payload)) if !payload.is_empty() => Ok(()),
    _ => Err(ApiError::validation("image data URL has no payload")),
  }
}
