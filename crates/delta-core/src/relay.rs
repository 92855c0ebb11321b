//! The `RelayQuery` trait, the boundary to the external relay query service.
//!
//! Implementations own the wire protocol and connection handling. The rest of
//! the system depends on this abstraction, never on a concrete client.

use std::{future::Future, time::Duration};

use thiserror::Error;

use crate::{document::Document, endpoint::Endpoint, subject::SubjectKey};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Which documents to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
  /// Document categories, e.g. [`crate::document::PROFILE_KIND`].
  pub kinds:   Vec<u16>,
  pub authors: Vec<SubjectKey>,
  pub limit:   Option<usize>,
}

impl Filter {
  /// The newest document of `kind` authored by `subject`.
  pub fn latest(kind: u16, subject: SubjectKey) -> Self {
    Self {
      kinds:   vec![kind],
      authors: vec![subject],
      limit:   Some(1),
    }
  }
}

/// How to run a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
  /// The query must settle within this bound.
  pub timeout:     Duration,
  /// Pin the query to exactly one endpoint. `None` lets the service use its
  /// whole pool.
  pub restrict_to: Option<Endpoint>,
}

/// A query that did not produce a result set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
  #[error("query timed out after {0:?}")]
  Timeout(Duration),

  #[error("transport error: {0}")]
  Transport(String),
}

impl QueryError {
  pub fn is_timeout(&self) -> bool { matches!(self, Self::Timeout(_)) }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the relay query service.
///
/// Zero documents is a successful, empty answer; only timeouts and transport
/// failures are errors. The returned future is `Send` so queries can be
/// spawned onto a multi-threaded runtime.
pub trait RelayQuery: Send + Sync {
  fn query(
    &self,
    filter: Filter,
    options: QueryOptions,
  ) -> impl Future<Output = Result<Vec<Document>, QueryError>> + Send + '_;
}
