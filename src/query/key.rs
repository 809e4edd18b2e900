//! Structural cache keys.
//!
//! A [`QueryKey`] is an ordered list of string tokens. Two keys are equal when
//! they hold the same tokens in the same order, and a key "belongs" to a prefix
//! when its leading tokens match the prefix token-for-token. Invalidation works
//! on prefixes, so related queries should share their leading tokens.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
  /// Build a key from any sequence of tokens.
  pub fn new<I, S>(tokens: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self(tokens.into_iter().map(Into::into).collect())
  }

  /// The empty key. As a prefix it matches every key.
  pub fn root() -> Self {
    Self::default()
  }

  /// Append a trailing token.
  pub fn with(mut self, token: impl Into<String>) -> Self {
    self.0.push(token.into());
    self
  }

  pub fn tokens(&self) -> &[String] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// True when `prefix` matches the leading tokens of this key.
  /// A key is its own prefix.
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    self.0.starts_with(&prefix.0)
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[")?;
    for (i, token) in self.0.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{:?}", token)?;
    }
    write!(f, "]")
  }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for QueryKey {
  fn from(tokens: [S; N]) -> Self {
    Self::new(tokens)
  }
}

impl From<Vec<String>> for QueryKey {
  fn from(tokens: Vec<String>) -> Self {
    Self(tokens)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_structural_equality() {
    let a = QueryKey::from(["document", "D1", "annotations"]);
    let b = QueryKey::new(vec!["document".to_string(), "D1".into(), "annotations".into()]);
    assert_eq!(a, b);
  }

  #[test]
  fn test_token_order_matters() {
    let a = QueryKey::from(["a", "b"]);
    let b = QueryKey::from(["b", "a"]);
    assert_ne!(a, b);
  }

  #[test]
  fn test_length_matters() {
    let a = QueryKey::from(["document", "D1"]);
    let b = QueryKey::from(["document", "D1", "annotations"]);
    assert_ne!(a, b);
  }

  #[test]
  fn test_starts_with_prefix() {
    let key = QueryKey::from(["document", "D1", "annotations"]);
    assert!(key.starts_with(&QueryKey::from(["document"])));
    assert!(key.starts_with(&QueryKey::from(["document", "D1"])));
    assert!(key.starts_with(&key.clone()));
    assert!(key.starts_with(&QueryKey::root()));
  }

  #[test]
  fn test_starts_with_is_token_wise() {
    // "D1" must not match "D10"
    let key = QueryKey::from(["document", "D10", "annotations"]);
    assert!(!key.starts_with(&QueryKey::from(["document", "D1"])));
  }

  #[test]
  fn test_longer_prefix_does_not_match() {
    let key = QueryKey::from(["document", "D1"]);
    assert!(!key.starts_with(&QueryKey::from(["document", "D1", "annotations"])));
  }

  #[test]
  fn test_with_appends_token() {
    let key = QueryKey::from(["documents", "list"]).with("contract");
    assert_eq!(key, QueryKey::from(["documents", "list", "contract"]));
  }

  #[test]
  fn test_display() {
    let key = QueryKey::from(["user", "u1", "stamps"]);
    assert_eq!(key.to_string(), r#"["user", "u1", "stamps"]"#);
  }
}
