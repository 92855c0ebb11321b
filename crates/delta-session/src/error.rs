//! Error type for `delta-session`.
//!
//! Only caller mistakes surface here. Per-endpoint query failures are state
//! (an `EndpointOutcome::Failed`), never an `Err`.

use delta_core::endpoint::Endpoint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] delta_core::Error),

  #[error("no subject has been set")]
  NoSubject,

  #[error("the subject's declared relay list has not resolved yet")]
  DeclaredListPending,

  #[error("endpoint {0} is not in the current universe")]
  UnknownEndpoint(Endpoint),

  #[error("config error: {0}")]
  Config(#[from] config::ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
