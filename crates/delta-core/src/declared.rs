//! The subject's self-declared relay list (kind 10002).
//!
//! Endpoints are carried as `r` tags: `["r", url]` for a relay used both ways,
//! or `["r", url, "read"|"write"]` for a one-way relay. Other tags are ignored.

use serde::{Deserialize, Serialize};

use crate::{document::Document, endpoint::Endpoint};

/// One `(endpoint, readable, writable)` entry of a relay list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredEndpoint {
  pub endpoint: Endpoint,
  pub readable: bool,
  pub writable: bool,
}

/// Extract the declared entries from a relay-list document, in tag order.
pub fn parse_relay_list(doc: &Document) -> Vec<DeclaredEndpoint> {
  doc
    .tags()
    .iter()
    .filter_map(|tag| match tag.as_slice() {
      [name, url, rest @ ..] if name == "r" && !url.is_empty() => {
        let (readable, writable) = match rest.first().map(String::as_str) {
          Some("read") => (true, false),
          Some("write") => (false, true),
          _ => (true, true),
        };
        Some(DeclaredEndpoint {
          endpoint: Endpoint::new(url.clone()),
          readable,
          writable,
        })
      }
      _ => None,
    })
    .collect()
}
