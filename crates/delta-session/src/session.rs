//! [`Session`]: one subject, its sources, and what each source said.

use std::sync::Arc;

use delta_core::{
  declared::DeclaredEndpoint,
  endpoint::Endpoint,
  outcome::EndpointOutcome,
  reconcile::{self, FieldDiff, Report},
  registry::SourceRegistry,
  relay::RelayQuery,
  subject::SubjectKey,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
  Error, Result, SessionConfig, adapter, fanout,
  state::{BatchTag, DeclaredStatus, State},
};

/// The reconciliation session for one subject at a time.
///
/// Cheap to clone; clones share state. Any operation may start while a
/// fan-out is still in flight: results that arrive for a subject that has
/// since been replaced are dropped.
pub struct Session<R> {
  relay:  Arc<R>,
  config: Arc<SessionConfig>,
  state:  Arc<RwLock<State>>,
}

impl<R> Clone for Session<R> {
  fn clone(&self) -> Self {
    Self {
      relay:  Arc::clone(&self.relay),
      config: Arc::clone(&self.config),
      state:  Arc::clone(&self.state),
    }
  }
}

impl<R: RelayQuery + 'static> Session<R> {
  pub fn new(relay: Arc<R>, config: SessionConfig) -> Self {
    let registry = SourceRegistry::new(config.default_endpoints())
      .with_required_scheme(config.required_scheme.clone());
    Self {
      relay,
      config: Arc::new(config),
      state: Arc::new(RwLock::new(State::new(registry))),
    }
  }

  pub fn config(&self) -> &SessionConfig { &self.config }

  // ── Subject ───────────────────────────────────────────────────────────────

  /// Decode `input` and make it the current subject.
  ///
  /// Setting the subject that is already current changes nothing. Any other
  /// subject discards every outcome, the declared set, and interest in all
  /// in-flight queries.
  pub async fn set_subject(&self, input: &str) -> Result<SubjectKey> {
    let subject = SubjectKey::decode(input)?;
    let mut state = self.state.write().await;
    if state.subject != Some(subject) {
      info!(%subject, "subject changed");
      state.reset_for(subject);
    }
    Ok(subject)
  }

  pub async fn subject(&self) -> Option<SubjectKey> {
    self.state.read().await.subject
  }

  async fn current_tag(&self) -> Result<BatchTag> {
    self.state.read().await.tag().ok_or(Error::NoSubject)
  }

  // ── Declared relay list ──────────────────────────────────────────────────

  /// Fetch the subject's own relay list and install it as the
  /// `subject-declared` set.
  ///
  /// A failed fetch resolves the set as empty, so automatic querying is never
  /// blocked on an unreachable list. If the subject changes while the fetch
  /// is in flight, the result is returned but not installed.
  pub async fn load_declared(&self) -> Result<Vec<DeclaredEndpoint>> {
    let tag = self.current_tag().await?;
    let entries = match adapter::query_declared(
      self.relay.as_ref(),
      tag.subject,
      self.config.relay_list_timeout(),
    )
    .await
    {
      Ok(entries) => entries,
      Err(e) => {
        warn!(subject = %tag.subject, error = %e, "declared relay list unavailable");
        Vec::new()
      }
    };

    let mut state = self.state.write().await;
    if state.accepts(tag) {
      info!(subject = %tag.subject, count = entries.len(), "declared relay list resolved");
      state
        .registry
        .set_declared_endpoints(entries.iter().map(|d| d.endpoint.clone()));
      state.declared = DeclaredStatus::Resolved;
      state.sync_outcomes();
    }
    Ok(entries)
  }

  /// Stop waiting for the declared relay list. Nothing will be queried
  /// automatically; every endpoint stays `Unchecked` until promoted.
  pub async fn skip_declared(&self) -> Result<()> {
    let mut state = self.state.write().await;
    if state.subject.is_none() {
      return Err(Error::NoSubject);
    }
    if state.declared == DeclaredStatus::Pending {
      state.declared = DeclaredStatus::Skipped;
    }
    Ok(())
  }

  pub async fn declared_status(&self) -> DeclaredStatus {
    self.state.read().await.declared
  }

  // ── Querying ──────────────────────────────────────────────────────────────

  async fn run(&self, tag: BatchTag, endpoints: Vec<Endpoint>) -> Report {
    fanout::dispatch(
      &self.relay,
      &self.state,
      tag,
      endpoints,
      self.config.query_timeout(),
    )
    .await;
    self.report().await
  }

  /// First pass for the current subject: query every endpoint the subject
  /// declared, leave the rest `Unchecked`.
  ///
  /// Refuses to run until the declared list has resolved or been skipped.
  pub async fn check(&self) -> Result<Report> {
    let (tag, trusted) = {
      let mut state = self.state.write().await;
      let tag = state.tag().ok_or(Error::NoSubject)?;
      if !state.declared.is_settled() {
        return Err(Error::DeclaredListPending);
      }
      state.sync_outcomes();
      let trusted: Vec<Endpoint> = state
        .outcomes
        .keys()
        .filter(|e| state.registry.is_declared(e))
        .cloned()
        .collect();
      (tag, trusted)
    };
    Ok(self.run(tag, trusted).await)
  }

  /// Set the subject, resolve its declared relay list, and run the first
  /// pass.
  pub async fn start(&self, input: &str) -> Result<Report> {
    self.set_subject(input).await?;
    if self.declared_status().await == DeclaredStatus::Pending {
      self.load_declared().await?;
    }
    self.check().await
  }

  /// Re-query exactly one endpoint, whatever its current state. Other
  /// outcomes are untouched.
  pub async fn refresh_endpoint(&self, endpoint: &Endpoint) -> Result<Report> {
    let tag = {
      let state = self.state.read().await;
      let tag = state.tag().ok_or(Error::NoSubject)?;
      if !state.outcomes.contains_key(endpoint) {
        return Err(Error::UnknownEndpoint(endpoint.clone()));
      }
      tag
    };
    Ok(self.run(tag, vec![endpoint.clone()]).await)
  }

  async fn refresh_where(
    &self,
    pick: impl Fn(&EndpointOutcome) -> bool,
  ) -> Result<Report> {
    let (tag, endpoints) = {
      let state = self.state.read().await;
      let tag = state.tag().ok_or(Error::NoSubject)?;
      let endpoints: Vec<Endpoint> = state
        .outcomes
        .values()
        .filter(|&o| pick(o))
        .map(|o| o.endpoint().clone())
        .collect();
      (tag, endpoints)
    };
    Ok(self.run(tag, endpoints).await)
  }

  /// Re-query every endpoint that has been checked before. `Unchecked`
  /// endpoints stay `Unchecked`.
  pub async fn refresh_all(&self) -> Result<Report> {
    self.refresh_where(|o| !o.is_unchecked()).await
  }

  /// Query every endpoint that is still `Unchecked`.
  pub async fn check_unchecked(&self) -> Result<Report> {
    self.refresh_where(EndpointOutcome::is_unchecked).await
  }

  // ── Registry ──────────────────────────────────────────────────────────────

  /// Add an operator-supplied endpoint. It joins the universe `Unchecked`.
  pub async fn add_custom_endpoint(&self, uri: &str) -> Result<Endpoint> {
    let mut state = self.state.write().await;
    let endpoint = state.registry.add_custom_endpoint(uri)?;
    state.sync_outcomes();
    info!(%endpoint, "custom endpoint added");
    Ok(endpoint)
  }

  /// Remove an operator-supplied endpoint. Its outcome goes too unless
  /// another set still lists it. Idempotent.
  pub async fn remove_custom_endpoint(&self, uri: &str) -> bool {
    let mut state = self.state.write().await;
    let removed = state.registry.remove_custom_endpoint(uri);
    if removed {
      state.sync_outcomes();
      info!(endpoint = uri, "custom endpoint removed");
    }
    removed
  }

  pub async fn registry(&self) -> SourceRegistry {
    self.state.read().await.registry.clone()
  }

  // ── Views ─────────────────────────────────────────────────────────────────

  /// Current outcomes in universe order. May be mid-flight.
  pub async fn outcomes(&self) -> Vec<EndpointOutcome> {
    self.state.read().await.outcomes.values().cloned().collect()
  }

  /// Reconcile the current outcomes.
  pub async fn report(&self) -> Report { self.state.read().await.report() }

  /// Side-by-side diff of one endpoint against the canonical record.
  pub async fn diff(&self, endpoint: &Endpoint) -> Option<FieldDiff> {
    let state = self.state.read().await;
    reconcile::diff_endpoint(state.outcomes.values(), endpoint)
  }

  /// Whether a query for `endpoint` is currently in flight.
  pub async fn is_refreshing(&self, endpoint: &Endpoint) -> bool {
    self.state.read().await.is_refreshing(endpoint)
  }
}
