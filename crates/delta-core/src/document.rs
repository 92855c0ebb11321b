//! Documents: the signed records a relay hands back.
//!
//! A [`Document`] keeps the raw envelope of an event and, for profile
//! documents, a best-effort parse of its JSON content into [`ProfileFields`].
//! A parse failure never discards the document; it only leaves `fields` empty.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Result, subject::SubjectKey};

/// Document kind for profile metadata.
pub const PROFILE_KIND: u16 = 0;
/// Document kind for the subject's self-declared relay list.
pub const RELAY_LIST_KIND: u16 = 10002;

// ─── Profile fields ──────────────────────────────────────────────────────────

/// Field-name → optional string, in the order the content declared them.
///
/// JSON `null` becomes `None`; strings are kept verbatim; any other scalar or
/// structured value is kept as its compact JSON text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileFields(IndexMap<String, Option<String>>);

impl ProfileFields {
  /// Parse profile content. Fails unless the content is a JSON object.
  pub fn parse(content: &str) -> Result<Self> {
    let map: serde_json::Map<String, serde_json::Value> =
      serde_json::from_str(content)?;
    Ok(Self(
      map
        .into_iter()
        .map(|(k, v)| {
          let v = match v {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
          };
          (k, v)
        })
        .collect(),
    ))
  }

  /// The value for `field`, flattening "absent" and "null" into `None`.
  pub fn get(&self, field: &str) -> Option<&str> {
    self.0.get(field).and_then(|v| v.as_deref())
  }

  pub fn insert(&mut self, field: impl Into<String>, value: Option<String>) {
    self.0.insert(field.into(), value);
  }

  /// Entry-by-entry equality including declaration order, i.e. the two maps
  /// would serialise to the same text.
  pub fn is_identical(&self, other: &Self) -> bool {
    self.0.iter().eq(other.0.iter())
  }

  /// Pretty-printed JSON, one entry per line.
  pub fn to_pretty_json(&self) -> String {
    serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".into())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for ProfileFields {
  fn from_iter<T: IntoIterator<Item = (K, Option<String>)>>(iter: T) -> Self {
    Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
  }
}

// ─── Raw event ───────────────────────────────────────────────────────────────

/// The wire shape of a signed event as relays serialise it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
  pub id:         String,
  pub pubkey:     SubjectKey,
  pub created_at: i64,
  pub kind:       u16,
  #[serde(default)]
  pub tags:       Vec<Vec<String>>,
  #[serde(default)]
  pub content:    String,
  #[serde(default)]
  pub sig:        String,
}

// ─── Document ────────────────────────────────────────────────────────────────

/// One document as returned by one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  /// The untouched envelope.
  pub raw:    RawEvent,
  /// Parsed profile content; `None` when the content is not a JSON object.
  pub fields: Option<ProfileFields>,
}

impl Document {
  pub fn from_raw(raw: RawEvent) -> Self {
    let fields = ProfileFields::parse(&raw.content).ok();
    Self { raw, fields }
  }

  /// Deserialise a relay's JSON event and wrap it.
  pub fn from_json(json: &str) -> Result<Self> {
    let raw: RawEvent = serde_json::from_str(json)?;
    Ok(Self::from_raw(raw))
  }

  pub fn subject(&self) -> SubjectKey { self.raw.pubkey }

  /// Endpoint-asserted logical timestamp in seconds. Larger is presumed
  /// newer; nothing more is trusted about it.
  pub fn created_at(&self) -> i64 { self.raw.created_at }

  pub fn kind(&self) -> u16 { self.raw.kind }

  pub fn content(&self) -> &str { &self.raw.content }

  pub fn tags(&self) -> &[Vec<String>] { &self.raw.tags }
}

/// Pick the document with the greatest `created_at`; the earliest one wins a
/// tie.
pub fn newest(docs: impl IntoIterator<Item = Document>) -> Option<Document> {
  docs.into_iter().fold(None, |best, doc| match best {
    Some(b) if b.created_at() >= doc.created_at() => Some(b),
    _ => Some(doc),
  })
}
