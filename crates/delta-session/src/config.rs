//! Runtime configuration for a [`crate::Session`].
//!
//! Defaults are compiled in; an optional config file and `DELTA_*`
//! environment variables are layered on top, in that order.

use std::{path::Path, time::Duration};

use delta_core::endpoint::{DEFAULT_REQUIRED_SCHEME, Endpoint};
use serde::Deserialize;

use crate::Result;

/// Relays every session starts with.
pub const DEFAULT_RELAYS: [&str; 6] = [
  "wss://relay.damus.io",
  "wss://relay.nostr.band",
  "wss://nos.lol",
  "wss://relay.primal.net",
  "wss://relay.snort.social",
  "wss://purplepag.es",
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
  /// Seed of the `default` source set.
  pub default_relays:        Vec<String>,
  /// Bound on each single-endpoint profile query.
  pub query_timeout_ms:      u64,
  /// Bound on the subject's declared relay-list query.
  pub relay_list_timeout_ms: u64,
  /// Prefix every custom endpoint must carry.
  pub required_scheme:       String,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      default_relays:        DEFAULT_RELAYS.map(String::from).to_vec(),
      query_timeout_ms:      5_000,
      relay_list_timeout_ms: 3_000,
      required_scheme:       DEFAULT_REQUIRED_SCHEME.to_string(),
    }
  }
}

impl SessionConfig {
  /// Load from `path` (if given and present) and the environment.
  ///
  /// `DELTA_DEFAULT_RELAYS` is read as a comma-separated list.
  pub fn load(path: Option<&Path>) -> Result<Self> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
      builder =
        builder.add_source(config::File::from(path.to_path_buf()).required(false));
    }
    let settings = builder
      .add_source(
        config::Environment::with_prefix("DELTA")
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("default_relays"),
      )
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  pub fn query_timeout(&self) -> Duration {
    Duration::from_millis(self.query_timeout_ms)
  }

  pub fn relay_list_timeout(&self) -> Duration {
    Duration::from_millis(self.relay_list_timeout_ms)
  }

  pub fn default_endpoints(&self) -> impl Iterator<Item = Endpoint> + '_ {
    self.default_relays.iter().map(|s| Endpoint::new(s.as_str()))
  }
}
