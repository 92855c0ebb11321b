//! Endpoint query adapter: one endpoint, one subject, one outcome.
//!
//! Wraps a [`RelayQuery`] call in a hard timeout and folds whatever comes
//! back into an [`EndpointOutcome`]. Nothing escapes as an error.

use std::time::Duration;

use chrono::{DateTime, Utc};
use delta_core::{
  declared::{DeclaredEndpoint, parse_relay_list},
  document::{self, Document, PROFILE_KIND, RELAY_LIST_KIND},
  endpoint::Endpoint,
  outcome::EndpointOutcome,
  relay::{Filter, QueryError, QueryOptions, RelayQuery},
  subject::SubjectKey,
};
use tracing::{debug, warn};

/// Run `query` against `relay`, giving up after `timeout` even if the
/// service itself does not.
async fn bounded<R: RelayQuery>(
  relay: &R,
  filter: Filter,
  options: QueryOptions,
) -> Result<Vec<Document>, QueryError> {
  let timeout = options.timeout;
  tokio::time::timeout(timeout, relay.query(filter, options))
    .await
    .unwrap_or(Err(QueryError::Timeout(timeout)))
}

/// Keep only documents of `kind` authored by `subject`, logging the rest.
fn retain_matching(
  docs: Vec<Document>,
  kind: u16,
  subject: SubjectKey,
  source: &str,
) -> Vec<Document> {
  let before = docs.len();
  let kept: Vec<Document> = docs
    .into_iter()
    .filter(|d| d.kind() == kind && d.subject() == subject)
    .collect();
  if kept.len() != before {
    warn!(
      source,
      dropped = before - kept.len(),
      "relay returned documents for another subject or kind"
    );
  }
  kept
}

/// Fold a raw query result into an outcome for `endpoint`.
pub fn outcome_from(
  endpoint: Endpoint,
  subject: SubjectKey,
  result: Result<Vec<Document>, QueryError>,
  queried_at: DateTime<Utc>,
) -> EndpointOutcome {
  match result {
    Err(e) => {
      if e.is_timeout() {
        warn!(%endpoint, error = %e, "profile query timed out");
      } else {
        warn!(%endpoint, error = %e, "profile query failed");
      }
      EndpointOutcome::Failed {
        endpoint,
        error: e.to_string(),
      }
    }
    Ok(docs) => {
      let docs = retain_matching(docs, PROFILE_KIND, subject, endpoint.as_str());
      match document::newest(docs) {
        None => {
          debug!(%endpoint, "no profile found");
          EndpointOutcome::NotFound { endpoint }
        }
        Some(document) => {
          if document.fields.is_none() {
            warn!(%endpoint, id = %document.raw.id, "profile content did not parse");
          }
          debug!(%endpoint, created_at = document.created_at(), "profile found");
          EndpointOutcome::Found {
            endpoint,
            document,
            queried_at,
          }
        }
      }
    }
  }
}

/// Query one endpoint for the subject's newest profile document.
pub async fn query_endpoint<R: RelayQuery>(
  relay: &R,
  endpoint: &Endpoint,
  subject: SubjectKey,
  timeout: Duration,
) -> EndpointOutcome {
  let options = QueryOptions {
    timeout,
    restrict_to: Some(endpoint.clone()),
  };
  let result = bounded(relay, Filter::latest(PROFILE_KIND, subject), options).await;
  outcome_from(endpoint.clone(), subject, result, Utc::now())
}

/// Ask the relay pool for the subject's own relay list.
///
/// An absent list is an empty list, not an error.
pub async fn query_declared<R: RelayQuery>(
  relay: &R,
  subject: SubjectKey,
  timeout: Duration,
) -> Result<Vec<DeclaredEndpoint>, QueryError> {
  let options = QueryOptions {
    timeout,
    restrict_to: None,
  };
  let docs = bounded(relay, Filter::latest(RELAY_LIST_KIND, subject), options).await?;
  let docs = retain_matching(docs, RELAY_LIST_KIND, subject, "pool");
  Ok(
    document::newest(docs)
      .map(|doc| parse_relay_list(&doc))
      .unwrap_or_default(),
  )
}
