//! A URI-like string naming one remote relay.
//!
//! Endpoints compare by exact string equality. No case folding or
//! trailing-slash normalisation is applied: `wss://a/` and `wss://a` are two
//! distinct sources.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The scheme custom endpoints must carry unless configured otherwise.
pub const DEFAULT_REQUIRED_SCHEME: &str = "wss://";

#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
  /// Wrap a string as-is. Seed and subject-declared endpoints go through
  /// here; only operator-supplied endpoints are validated.
  pub fn new(uri: impl Into<String>) -> Self { Self(uri.into()) }

  /// Trim surrounding whitespace and require `scheme` as a prefix.
  pub fn parse_with_scheme(uri: &str, scheme: &str) -> Result<Self> {
    let uri = uri.trim();
    if uri.len() <= scheme.len() || !uri.starts_with(scheme) {
      return Err(Error::InvalidEndpoint(uri.to_string()));
    }
    Ok(Self(uri.to_string()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Endpoint {
  fn from(s: &str) -> Self { Self::new(s) }
}

impl From<String> for Endpoint {
  fn from(s: String) -> Self { Self(s) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scheme_is_required() {
    assert!(matches!(
      Endpoint::parse_with_scheme("relay.example.com", DEFAULT_REQUIRED_SCHEME),
      Err(Error::InvalidEndpoint(_))
    ));
    assert!(matches!(
      Endpoint::parse_with_scheme("ws://relay.example.com", DEFAULT_REQUIRED_SCHEME),
      Err(Error::InvalidEndpoint(_))
    ));
    assert!(matches!(
      Endpoint::parse_with_scheme("wss://", DEFAULT_REQUIRED_SCHEME),
      Err(Error::InvalidEndpoint(_))
    ));
  }

  #[test]
  fn input_is_trimmed_but_not_normalised() {
    let a = Endpoint::parse_with_scheme("  wss://relay.example.com/ ", "wss://")
      .unwrap();
    assert_eq!(a.as_str(), "wss://relay.example.com/");
    assert_ne!(a, Endpoint::new("wss://relay.example.com"));
  }
}
