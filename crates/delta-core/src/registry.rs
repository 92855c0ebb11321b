//! The source registry: named, possibly overlapping sets of endpoints.
//!
//! Three sets exist, in registration order: `default` (immutable seed data),
//! `custom` (operator-managed) and `subject-declared` (replaced wholesale when
//! the subject's own relay list arrives). The query universe is their
//! de-duplicated union, first-seen order preserved.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  endpoint::{DEFAULT_REQUIRED_SCHEME, Endpoint},
};

pub const DEFAULT_LABEL: &str = "default";
pub const CUSTOM_LABEL: &str = "custom";
pub const DECLARED_LABEL: &str = "subject-declared";

const DEFAULT_IDX: usize = 0;
const CUSTOM_IDX: usize = 1;
const DECLARED_IDX: usize = 2;

/// A labelled, ordered list of endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSet {
  pub label:     String,
  pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRegistry {
  sets:            Vec<SourceSet>,
  required_scheme: String,
}

impl SourceRegistry {
  /// Seed the `default` set; `custom` and `subject-declared` start empty.
  pub fn new(defaults: impl IntoIterator<Item = Endpoint>) -> Self {
    let set = |label: &str, endpoints: Vec<Endpoint>| SourceSet {
      label: label.to_string(),
      endpoints,
    };
    Self {
      sets:            vec![
        set(DEFAULT_LABEL, defaults.into_iter().collect()),
        set(CUSTOM_LABEL, Vec::new()),
        set(DECLARED_LABEL, Vec::new()),
      ],
      required_scheme: DEFAULT_REQUIRED_SCHEME.to_string(),
    }
  }

  /// Override the scheme custom endpoints must start with.
  pub fn with_required_scheme(mut self, scheme: impl Into<String>) -> Self {
    self.required_scheme = scheme.into();
    self
  }

  pub fn sets(&self) -> &[SourceSet] { &self.sets }

  pub fn defaults(&self) -> &[Endpoint] { &self.sets[DEFAULT_IDX].endpoints }

  pub fn custom(&self) -> &[Endpoint] { &self.sets[CUSTOM_IDX].endpoints }

  pub fn declared(&self) -> &[Endpoint] { &self.sets[DECLARED_IDX].endpoints }

  /// Whether the subject itself declared `endpoint`.
  pub fn is_declared(&self, endpoint: &Endpoint) -> bool {
    self.declared().contains(endpoint)
  }

  /// Validate and append an operator-supplied endpoint to `custom`.
  ///
  /// Rejects values without the required scheme, and exact duplicates of an
  /// entry already in `custom`. Returns the stored endpoint.
  pub fn add_custom_endpoint(&mut self, uri: &str) -> Result<Endpoint> {
    let endpoint = Endpoint::parse_with_scheme(uri, &self.required_scheme)?;
    let custom = &mut self.sets[CUSTOM_IDX].endpoints;
    if custom.contains(&endpoint) {
      return Err(Error::DuplicateEndpoint(endpoint.to_string()));
    }
    custom.push(endpoint.clone());
    Ok(endpoint)
  }

  /// Remove `uri` from `custom`, trimmed the same way additions are.
  /// Removing an absent entry is a no-op. Returns whether anything was
  /// removed.
  pub fn remove_custom_endpoint(&mut self, uri: &str) -> bool {
    let uri = uri.trim();
    let custom = &mut self.sets[CUSTOM_IDX].endpoints;
    let before = custom.len();
    custom.retain(|e| e.as_str() != uri);
    custom.len() != before
  }

  /// Replace the `subject-declared` set wholesale.
  pub fn set_declared_endpoints(
    &mut self,
    endpoints: impl IntoIterator<Item = Endpoint>,
  ) {
    self.sets[DECLARED_IDX].endpoints = endpoints.into_iter().collect();
  }

  /// The de-duplicated union of every set, in first-seen order across sets
  /// taken in registration order.
  pub fn universe(&self) -> IndexSet<Endpoint> {
    self
      .sets
      .iter()
      .flat_map(|set| set.endpoints.iter().cloned())
      .collect()
  }
}
