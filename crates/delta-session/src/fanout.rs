//! Fan-out coordinator: dispatch one task per endpoint and let each result
//! land independently.

use std::{sync::Arc, time::Duration};

use delta_core::{endpoint::Endpoint, relay::RelayQuery};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
  adapter,
  state::{BatchTag, State},
};

/// Query every endpoint in `endpoints` concurrently for the subject in `tag`
/// and wait for all of them to settle.
///
/// Each outcome is written to `state` the moment its own query finishes, so
/// readers see the batch resolve piece by piece. Results whose tag has gone
/// stale by the time they arrive are discarded.
///
/// Queries run as detached tasks: dropping the returned future stops the
/// wait, not the queries, and every in-flight marker is still cleared when
/// its result lands.
pub(crate) async fn dispatch<R>(
  relay: &Arc<R>,
  state: &Arc<RwLock<State>>,
  tag: BatchTag,
  endpoints: Vec<Endpoint>,
  timeout: Duration,
) where
  R: RelayQuery + 'static,
{
  if endpoints.is_empty() {
    return;
  }

  {
    let mut guard = state.write().await;
    if !guard.accepts(tag) {
      return;
    }
    for endpoint in &endpoints {
      guard.begin(endpoint);
    }
  }

  let count = endpoints.len();
  info!(subject = %tag.subject, endpoints = count, "fan-out started");

  let mut handles = Vec::with_capacity(count);
  for endpoint in endpoints {
    let relay = Arc::clone(relay);
    let state = Arc::clone(state);
    handles.push(tokio::spawn(async move {
      let outcome =
        adapter::query_endpoint(relay.as_ref(), &endpoint, tag.subject, timeout)
          .await;
      if !state.write().await.apply(tag, outcome) {
        debug!(%endpoint, "discarded result for superseded subject or removed endpoint");
      }
    }));
  }

  for handle in handles {
    if let Err(e) = handle.await {
      warn!(error = %e, "endpoint query task did not complete");
    }
  }

  info!(subject = %tag.subject, endpoints = count, "fan-out settled");
}
