//! Failures talking to the document service.

/// Error taxonomy for remote calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
  /// The request never completed (connection refused, timeout, TLS...)
  #[error("network error: {0}")]
  Network(String),
  /// The service answered with a non-success status
  #[error("server returned {status}: {message}")]
  Server { status: u16, message: String },
  /// Rejected locally before anything was sent
  #[error("invalid request: {0}")]
  Validation(String),
  /// The service answered but the body did not have the expected shape
  #[error("unexpected response body: {0}")]
  Decode(String),
}

impl ApiError {
  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation(message.into())
  }

  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Server { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn is_network(&self) -> bool {
    matches!(self, Self::Network(_))
  }

  pub fn is_not_found(&self) -> bool {
    self.status() == Some(404)
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(error: reqwest::Error) -> Self {
    if error.is_decode() {
      Self::Decode(error.to_string())
    } else if let Some(status) = error.status() {
      Self::Server {
        status: status.as_u16(),
        message: error.to_string(),
      }
    } else {
      Self::Network(error.to_string())
    }
  }
}
