//! The mutable state behind a session.
//!
//! The outcome map is the only structure queries write to. Every write is a
//! whole-entry replacement keyed by endpoint, made under the session lock.

use std::collections::HashMap;

use delta_core::{
  endpoint::Endpoint,
  outcome::EndpointOutcome,
  reconcile::{self, Report},
  registry::SourceRegistry,
  subject::SubjectKey,
};
use indexmap::IndexMap;
use serde::Serialize;

/// Whether the subject's own relay list is known yet. Automatic querying
/// waits until it is `Resolved` or `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredStatus {
  /// No subject yet.
  Idle,
  Pending,
  Resolved,
  Skipped,
}

impl DeclaredStatus {
  pub fn is_settled(self) -> bool { matches!(self, Self::Resolved | Self::Skipped) }
}

/// Identifies the subject a batch of queries was issued for. Results carrying
/// a tag that no longer matches the state are dropped on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BatchTag {
  pub subject:    SubjectKey,
  pub generation: u64,
}

#[derive(Debug)]
pub(crate) struct State {
  pub subject:    Option<SubjectKey>,
  /// Bumped on every subject change.
  pub generation: u64,
  pub declared:   DeclaredStatus,
  pub registry:   SourceRegistry,
  /// One entry per universe endpoint, in universe order, once a subject is
  /// set. Empty otherwise.
  pub outcomes:   IndexMap<Endpoint, EndpointOutcome>,
  /// Number of queries currently dispatched per endpoint.
  pub in_flight:  HashMap<Endpoint, usize>,
}

impl State {
  pub fn new(registry: SourceRegistry) -> Self {
    Self {
      subject: None,
      generation: 0,
      declared: DeclaredStatus::Idle,
      registry,
      outcomes: IndexMap::new(),
      in_flight: HashMap::new(),
    }
  }

  pub fn tag(&self) -> Option<BatchTag> {
    self.subject.map(|subject| BatchTag {
      subject,
      generation: self.generation,
    })
  }

  pub fn accepts(&self, tag: BatchTag) -> bool { self.tag() == Some(tag) }

  /// Switch to `subject`, discarding everything learned about the previous
  /// one.
  pub fn reset_for(&mut self, subject: SubjectKey) {
    self.subject = Some(subject);
    self.generation += 1;
    self.declared = DeclaredStatus::Pending;
    self.registry.set_declared_endpoints(Vec::new());
    self.outcomes.clear();
    self.in_flight.clear();
    self.sync_outcomes();
  }

  /// Bring the outcome map in line with the registry universe: new endpoints
  /// start `Unchecked`, endpoints that left the universe lose their entry,
  /// and order follows the universe.
  pub fn sync_outcomes(&mut self) {
    if self.subject.is_none() {
      self.outcomes.clear();
      return;
    }
    let mut previous = std::mem::take(&mut self.outcomes);
    self.outcomes = self
      .registry
      .universe()
      .into_iter()
      .map(|endpoint| {
        let outcome = previous.swap_remove(&endpoint).unwrap_or_else(|| {
          EndpointOutcome::Unchecked {
            endpoint: endpoint.clone(),
          }
        });
        (endpoint, outcome)
      })
      .collect();
  }

  pub fn begin(&mut self, endpoint: &Endpoint) {
    *self.in_flight.entry(endpoint.clone()).or_default() += 1;
  }

  fn finish(&mut self, endpoint: &Endpoint) {
    if let Some(n) = self.in_flight.get_mut(endpoint) {
      *n -= 1;
      if *n == 0 {
        self.in_flight.remove(endpoint);
      }
    }
  }

  pub fn is_refreshing(&self, endpoint: &Endpoint) -> bool {
    self.in_flight.contains_key(endpoint)
  }

  /// Store `outcome` if `tag` is still current and its endpoint is still in
  /// the universe. Returns whether it was stored.
  pub fn apply(&mut self, tag: BatchTag, outcome: EndpointOutcome) -> bool {
    if !self.accepts(tag) {
      return false;
    }
    let endpoint = outcome.endpoint().clone();
    self.finish(&endpoint);
    match self.outcomes.get_mut(&endpoint) {
      Some(slot) => {
        *slot = outcome;
        true
      }
      None => false,
    }
  }

  pub fn report(&self) -> Report {
    reconcile::reconcile(self.outcomes.values(), |e| {
      self.registry.is_declared(e)
    })
  }
}
