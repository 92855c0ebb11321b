//! Error types for `delta-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid subject format: {0}")]
  InvalidSubjectFormat(String),

  #[error("invalid endpoint {0:?}: missing required scheme")]
  InvalidEndpoint(String),

  #[error("endpoint {0} is already in the custom set")]
  DuplicateEndpoint(String),

  #[error("parse error: {0}")]
  Parse(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
