//! Per-endpoint outcome state and its derived classification.
//!
//! Exactly one [`EndpointOutcome`] exists for every endpoint in the current
//! universe. Outcomes are replaced whole; nothing ever observes a half-built
//! one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{document::Document, endpoint::Endpoint};

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// The state of one endpoint after (or before) querying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EndpointOutcome {
  /// In the universe but not yet queried.
  Unchecked { endpoint: Endpoint },
  /// The endpoint returned at least one document; this is the newest.
  Found {
    endpoint:   Endpoint,
    document:   Document,
    queried_at: DateTime<Utc>,
  },
  /// The query succeeded with zero results. Not an error.
  NotFound { endpoint: Endpoint },
  /// The query timed out or the transport failed.
  Failed { endpoint: Endpoint, error: String },
}

impl EndpointOutcome {
  pub fn endpoint(&self) -> &Endpoint {
    match self {
      Self::Unchecked { endpoint }
      | Self::Found { endpoint, .. }
      | Self::NotFound { endpoint }
      | Self::Failed { endpoint, .. } => endpoint,
    }
  }

  pub fn is_unchecked(&self) -> bool { matches!(self, Self::Unchecked { .. }) }

  pub fn document(&self) -> Option<&Document> {
    match self {
      Self::Found { document, .. } => Some(document),
      _ => None,
    }
  }

  pub fn created_at(&self) -> Option<i64> {
    self.document().map(Document::created_at)
  }
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Derived, never stored. See [`crate::reconcile::classify`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Classification {
  Unchecked,
  NotFound,
  Error,
  Outdated,
  Latest,
  Ok,
}

impl Classification {
  /// Whether this counts toward the "issues" badge. Absence of a profile is
  /// explicitly not an issue.
  pub fn is_issue(self) -> bool { matches!(self, Self::Error) }
}
