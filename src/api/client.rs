use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::api::api_types::{ApiErrorBody, LoginRequest};
use crate::api::error::ApiError;
use crate::api::service::DocumentService;
use crate::api::types::{
  require_id, Annotation, Document, NewAnnotation, NewSignature, NewStamp, SavedSignature,
  SavedStamp, Session,
};
use crate::config::ApiConfig;

/// HTTP client for the document service
#[derive(Clone)]
pub struct HttpDocumentService {
  client: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl HttpDocumentService {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url = Url::parse(&config.url)
      .map_err(|e| eyre!("Invalid service URL {}: {}", config.url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("Service URL {} cannot be used as a base", config.url));
    }

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.request_timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url,
      token: None,
    })
  }

  /// Attach a bearer token to every following request.
  pub fn with_token(mut self, token: impl Into<String>) -> Self {
    self.token = Some(token.into());
    self
  }

  /// Exchange credentials for a session token.
  pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
    if email.trim().is_empty() || password.is_empty() {
      return Err(ApiError::validation("email and password are required"));
    }
    let url = self.endpoint(&["auth", "login"])?;
    self.post_json(url, &LoginRequest { email, password }).await
  }

  /// Build `<base>/<segments...>`, escaping each segment.
  fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| ApiError::validation("service URL cannot be a base"))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
    match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
    debug!(%url, "GET");
    let response = self.authorize(self.client.get(url)).send().await?;
    parse_response(response).await
  }

  async fn post_json<T, B>(&self, url: Url, body: &B) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    debug!(%url, "POST");
    let response = self
      .authorize(self.client.post(url))
      .json(body)
      .send()
      .await?;
    parse_response(response).await
  }

  async fn delete(&self, url: Url) -> Result<(), ApiError> {
    debug!(%url, "DELETE");
    let response = self.authorize(self.client.delete(url)).send().await?;
    check_status(response).await?;
    Ok(())
  }
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
  let response = check_status(response).await?;
  let bytes = response.bytes().await?;
  serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Turn any non-2xx answer into `ApiError::Server`, keeping the service's
/// own message when it sent one.
async fn check_status(response: Response) -> Result<Response, ApiError> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  let text = response.text().await.unwrap_or_default();
  let message = serde_json::from_str::<ApiErrorBody>(&text)
    .ok()
    .and_then(ApiErrorBody::into_message)
    .unwrap_or_else(|| {
      if text.trim().is_empty() {
        status
          .canonical_reason()
          .unwrap_or("request failed")
          .to_string()
      } else {
        text
      }
    });

  Err(ApiError::Server {
    status: status.as_u16(),
    message,
  })
}

#[async_trait]
impl DocumentService for HttpDocumentService {
  async fn list_documents(&self, search: &str) -> Result<Vec<Document>, ApiError> {
    let mut url = self.endpoint(&["documents"])?;
    let search = search.trim();
    if !search.is_empty() {
      url.query_pairs_mut().append_pair("search", search);
    }
    self.get_json(url).await
  }

  async fn get_document(&self, document_id: &str) -> Result<Document, ApiError> {
    require_id("document id", document_id)?;
    let url = self.endpoint(&["documents", document_id])?;
    self.get_json(url).await
  }

  async fn list_annotations(&self, document_id: &str) -> Result<Vec<Annotation>, ApiError> {
    require_id("document id", document_id)?;
    let url = self.endpoint(&["documents", document_id, "annotations"])?;
    self.get_json(url).await
  }

  async fn create_annotation(&self, annotation: &NewAnnotation) -> Result<Annotation, ApiError> {
    annotation.validate()?;
    let url = self.endpoint(&["documents", &annotation.document_id, "annotations"])?;
    self.post_json(url, annotation).await
  }

  async fn delete_annotation(
    &self,
    document_id: &str,
    annotation_id: &str,
  ) -> Result<(), ApiError> {
    require_id("document id", document_id)?;
    require_id("annotation id", annotation_id)?;
    let url = self.endpoint(&["documents", document_id, "annotations", annotation_id])?;
    self.delete(url).await
  }

  async fn list_signatures(&self) -> Result<Vec<SavedSignature>, ApiError> {
    let url = self.endpoint(&["signatures"])?;
    self.get_json(url).await
  }

  async fn create_signature(&self, signature: &NewSignature) -> Result<SavedSignature, ApiError> {
    signature.validate()?;
    let url = self.endpoint(&["signatures"])?;
    self.post_json(url, signature).await
  }

  async fn delete_signature(&self, signature_id: &str) -> Result<(), ApiError> {
    require_id("signature id", signature_id)?;
    let url = self.endpoint(&["signatures", signature_id])?;
    self.delete(url).await
  }

  async fn list_stamps(&self) -> Result<Vec<SavedStamp>, ApiError> {
    let url = self.endpoint(&["stamps"])?;
    self.get_json(url).await
  }

  async fn create_stamp(&self, stamp: &NewStamp) -> Result<SavedStamp, ApiError> {
    stamp.validate()?;
    let url = self.endpoint(&["stamps"])?;
    self.post_json(url, stamp).await
  }

  async fn delete_stamp(&self, stamp_id: &str) -> Result<(), ApiError> {
    require_id("stamp id", stamp_id)?;
    let url = self.endpoint(&["stamps", stamp_id])?;
    self.delete(url).await
  }
}
