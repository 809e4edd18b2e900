//! Wire-only request and response shapes.
//!
//! Domain types in `types` double as bodies where the wire format matches;
//! the types here exist only to talk to the service.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
  pub email: &'a str,
  pub password: &'a str,
}

/// Error body returned by the service on non-success responses.
/// Older endpoints use `error`, newer ones `message`.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub error: Option<String>,
}

impl ApiErrorBody {
  pub fn into_message(self) -> Option<String> {
    self.message.or(self.error).filter(|m| !m.trim().is_empty())
  }
}
