//! The reconciliation engine: outcomes in, canonical record and verdicts out.
//!
//! Everything here is a pure function of the current outcome mapping and is
//! re-run after every mutation. Nothing is cached between runs; at tens of
//! endpoints a full rescan costs nothing and cannot go stale.

use std::cmp::Ordering;

use serde::Serialize;

use crate::{
  document::ProfileFields,
  endpoint::Endpoint,
  outcome::{Classification, EndpointOutcome},
};

/// The profile fields compared between endpoints, in presentation order.
pub const COMPARED_FIELDS: [&str; 9] = [
  "name",
  "display_name",
  "picture",
  "banner",
  "about",
  "website",
  "nip05",
  "lud06",
  "lud16",
];

pub const SECONDS_PER_DAY: i64 = 86_400;

// ─── Canonical selection ─────────────────────────────────────────────────────

/// A borrowed view of the newest `Found` outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canonical<'a> {
  pub endpoint:   &'a Endpoint,
  pub created_at: i64,
  /// `None` when the newest document's content did not parse.
  pub fields:     Option<&'a ProfileFields>,
}

/// `argmax(created_at)` over the `Found` outcomes, first-encountered wins a
/// tie. `None` when nothing was found.
pub fn select_canonical<'a>(
  outcomes: impl IntoIterator<Item = &'a EndpointOutcome>,
) -> Option<Canonical<'a>> {
  let mut best: Option<Canonical<'a>> = None;
  for outcome in outcomes {
    let EndpointOutcome::Found { endpoint, document, .. } = outcome else {
      continue;
    };
    if best.is_some_and(|b| b.created_at >= document.created_at()) {
      continue;
    }
    best = Some(Canonical {
      endpoint,
      created_at: document.created_at(),
      fields: document.fields.as_ref(),
    });
  }
  best
}

// ─── Field comparison ────────────────────────────────────────────────────────

fn is_blank(value: Option<&str>) -> bool { value.is_none_or(str::is_empty) }

/// A field diverges when the values differ and at least one is non-empty; an
/// absent value against an empty string is not a divergence.
fn diverges(ours: Option<&str>, theirs: Option<&str>) -> bool {
  ours != theirs && !(is_blank(ours) && is_blank(theirs))
}

/// The compared fields on which `fields` diverges from `canonical`, in
/// [`COMPARED_FIELDS`] order.
pub fn divergent_fields(
  fields: &ProfileFields,
  canonical: &ProfileFields,
) -> Vec<&'static str> {
  COMPARED_FIELDS
    .into_iter()
    .filter(|k| diverges(fields.get(k), canonical.get(k)))
    .collect()
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Classify one outcome against the canonical record.
///
/// Precedence: unchecked, error, not-found, then for found outcomes outdated
/// (any divergent field), latest (field-map identical to canonical), and ok
/// for everything else, including "no canonical yet" and "no parsed fields".
pub fn classify(
  outcome: &EndpointOutcome,
  canonical: Option<&Canonical<'_>>,
) -> Classification {
  let document = match outcome {
    EndpointOutcome::Unchecked { .. } => return Classification::Unchecked,
    EndpointOutcome::Failed { .. } => return Classification::Error,
    EndpointOutcome::NotFound { .. } => return Classification::NotFound,
    EndpointOutcome::Found { document, .. } => document,
  };
  let (Some(ours), Some(theirs)) =
    (document.fields.as_ref(), canonical.and_then(|c| c.fields))
  else {
    return Classification::Ok;
  };
  if !divergent_fields(ours, theirs).is_empty() {
    Classification::Outdated
  } else if ours.is_identical(theirs) {
    Classification::Latest
  } else {
    Classification::Ok
  }
}

/// Whole days `created_at` trails the canonical timestamp, floored. Only
/// defined when the outcome is strictly older.
///
/// Both timestamps are relay-asserted, so the gap is taken in `i128`.
pub fn days_behind(created_at: i64, canonical_created_at: i64) -> Option<i64> {
  if created_at >= canonical_created_at {
    return None;
  }
  let gap = i128::from(canonical_created_at) - i128::from(created_at);
  i64::try_from(gap.div_euclid(i128::from(SECONDS_PER_DAY))).ok()
}

/// Render order: endpoint ascending, unchecked entries after all others.
pub fn display_order(a: &EndpointOutcome, b: &EndpointOutcome) -> Ordering {
  a.is_unchecked()
    .cmp(&b.is_unchecked())
    .then_with(|| a.endpoint().cmp(b.endpoint()))
}

// ─── Diff materialisation ────────────────────────────────────────────────────

/// One divergent field with both sides' values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
  pub field:           &'static str,
  pub outcome_value:   Option<String>,
  pub canonical_value: Option<String>,
}

/// One line of a pretty-printed field-map, flagged when it carries a
/// divergent field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
  pub text:        String,
  pub highlighted: bool,
}

/// Side-by-side comparison of one outcome's fields against the canonical
/// record. Deterministic for a given pair of field-maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
  pub changes:   Vec<FieldChange>,
  pub outcome:   ProfileFields,
  pub canonical: ProfileFields,
}

impl FieldDiff {
  pub fn between(outcome: &ProfileFields, canonical: &ProfileFields) -> Self {
    let changes = divergent_fields(outcome, canonical)
      .into_iter()
      .map(|field| FieldChange {
        field,
        outcome_value: outcome.get(field).map(str::to_owned),
        canonical_value: canonical.get(field).map(str::to_owned),
      })
      .collect();
    Self {
      changes,
      outcome: outcome.clone(),
      canonical: canonical.clone(),
    }
  }

  pub fn is_empty(&self) -> bool { self.changes.is_empty() }

  pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.changes.iter().map(|c| c.field)
  }

  /// The outcome's field-map as JSON lines.
  pub fn outcome_lines(&self) -> Vec<DiffLine> { self.lines(&self.outcome) }

  /// The canonical field-map as JSON lines.
  pub fn canonical_lines(&self) -> Vec<DiffLine> {
    self.lines(&self.canonical)
  }

  fn lines(&self, fields: &ProfileFields) -> Vec<DiffLine> {
    let keys: Vec<String> =
      self.fields().map(|f| format!("\"{f}\":")).collect();
    fields
      .to_pretty_json()
      .lines()
      .map(|line| {
        let trimmed = line.trim_start();
        DiffLine {
          text:        line.to_string(),
          highlighted: keys.iter().any(|k| trimmed.starts_with(k.as_str())),
        }
      })
      .collect()
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// An owned copy of the canonical record for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalRecord {
  pub endpoint:   Endpoint,
  pub created_at: i64,
  pub fields:     Option<ProfileFields>,
}

/// One outcome with everything derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledEntry {
  pub outcome:          EndpointOutcome,
  pub classification:   Classification,
  pub divergent_fields: Vec<&'static str>,
  pub days_behind:      Option<i64>,
  /// The subject itself declared this endpoint.
  pub trusted:          bool,
}

/// Per-classification counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
  pub unchecked: usize,
  pub not_found: usize,
  pub error:     usize,
  pub outdated:  usize,
  pub latest:    usize,
  pub ok:        usize,
}

impl Tally {
  fn record(&mut self, c: Classification) {
    let slot = match c {
      Classification::Unchecked => &mut self.unchecked,
      Classification::NotFound => &mut self.not_found,
      Classification::Error => &mut self.error,
      Classification::Outdated => &mut self.outdated,
      Classification::Latest => &mut self.latest,
      Classification::Ok => &mut self.ok,
    };
    *slot += 1;
  }

  /// Transport and timeout failures. Missing profiles are not issues.
  pub fn issues(&self) -> usize { self.error }

  /// Endpoints that answered but hold no profile.
  pub fn no_profile(&self) -> usize { self.not_found }

  pub fn total(&self) -> usize {
    self.unchecked + self.not_found + self.error + self.outdated + self.latest + self.ok
  }
}

/// The computed view of a session. Never stored, always derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
  pub canonical: Option<CanonicalRecord>,
  /// Sorted by [`display_order`].
  pub entries:   Vec<ReconciledEntry>,
  pub tally:     Tally,
}

impl Report {
  pub fn entry(&self, endpoint: &Endpoint) -> Option<&ReconciledEntry> {
    self.entries.iter().find(|e| e.outcome.endpoint() == endpoint)
  }

  pub fn outdated(&self) -> impl Iterator<Item = &ReconciledEntry> {
    self
      .entries
      .iter()
      .filter(|e| e.classification == Classification::Outdated)
  }
}

/// Reconcile `outcomes`, given in universe order.
///
/// `is_trusted` marks endpoints the subject declared itself.
pub fn reconcile<'a>(
  outcomes: impl IntoIterator<Item = &'a EndpointOutcome> + Clone,
  is_trusted: impl Fn(&Endpoint) -> bool,
) -> Report {
  let canonical = select_canonical(outcomes.clone());

  let mut tally = Tally::default();
  let mut entries: Vec<ReconciledEntry> = outcomes
    .into_iter()
    .map(|outcome| {
      let classification = classify(outcome, canonical.as_ref());
      tally.record(classification);

      let divergent_fields = match (outcome.document(), canonical) {
        (Some(doc), Some(c)) => match (doc.fields.as_ref(), c.fields) {
          (Some(ours), Some(theirs)) => divergent_fields(ours, theirs),
          _ => Vec::new(),
        },
        _ => Vec::new(),
      };
      let days_behind = outcome
        .created_at()
        .zip(canonical.map(|c| c.created_at))
        .and_then(|(ours, theirs)| days_behind(ours, theirs));

      ReconciledEntry {
        outcome: outcome.clone(),
        classification,
        divergent_fields,
        days_behind,
        trusted: is_trusted(outcome.endpoint()),
      }
    })
    .collect();
  entries.sort_by(|a, b| display_order(&a.outcome, &b.outcome));

  Report {
    canonical: canonical.map(|c| CanonicalRecord {
      endpoint:   c.endpoint.clone(),
      created_at: c.created_at,
      fields:     c.fields.cloned(),
    }),
    entries,
    tally,
  }
}

/// Materialise the diff for `endpoint` against the canonical record.
///
/// `None` unless the endpoint is `Found` with parsed fields and the canonical
/// record has parsed fields too.
pub fn diff_endpoint<'a>(
  outcomes: impl IntoIterator<Item = &'a EndpointOutcome> + Clone,
  endpoint: &Endpoint,
) -> Option<FieldDiff> {
  let canonical = select_canonical(outcomes.clone())?.fields?;
  let ours = outcomes
    .into_iter()
    .find(|o| o.endpoint() == endpoint)?
    .document()?
    .fields
    .as_ref()?;
  Some(FieldDiff::between(ours, canonical))
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::{
    document::{Document, PROFILE_KIND, RawEvent},
    subject::SubjectKey,
  };

  fn found(endpoint: &str, created_at: i64, content: &str) -> EndpointOutcome {
    EndpointOutcome::Found {
      endpoint:   Endpoint::new(endpoint),
      document:   Document::from_raw(RawEvent {
        id: format!("{endpoint}-{created_at}"),
        pubkey: SubjectKey::from_bytes([9; 32]),
        created_at,
        kind: PROFILE_KIND,
        tags: vec![],
        content: content.into(),
        sig: String::new(),
      }),
      queried_at: Utc.timestamp_opt(1_000_000, 0).unwrap(),
    }
  }

  fn not_found(endpoint: &str) -> EndpointOutcome {
    EndpointOutcome::NotFound { endpoint: Endpoint::new(endpoint) }
  }

  fn failed(endpoint: &str) -> EndpointOutcome {
    EndpointOutcome::Failed {
      endpoint: Endpoint::new(endpoint),
      error:    "query timed out after 5s".into(),
    }
  }

  fn unchecked(endpoint: &str) -> EndpointOutcome {
    EndpointOutcome::Unchecked { endpoint: Endpoint::new(endpoint) }
  }

  fn fields(json: &str) -> ProfileFields { ProfileFields::parse(json).unwrap() }

  fn no_trust(_: &Endpoint) -> bool { false }

  // ── Canonical ────────────────────────────────────────────────────────────

  #[test]
  fn canonical_is_greatest_created_at() {
    let outcomes = vec![
      found("wss://r1", 100, r#"{"name":"Alice"}"#),
      not_found("wss://r2"),
      found("wss://r3", 300, r#"{"name":"Alicia"}"#),
      failed("wss://r4"),
      found("wss://r5", 200, r#"{"name":"Al"}"#),
    ];
    let c = select_canonical(&outcomes).unwrap();
    assert_eq!(c.endpoint.as_str(), "wss://r3");
    assert_eq!(c.created_at, 300);
    assert_eq!(c.fields.unwrap().get("name"), Some("Alicia"));
  }

  #[test]
  fn canonical_tie_goes_to_first_encountered() {
    let outcomes = vec![
      found("wss://z", 500, r#"{"name":"first"}"#),
      found("wss://a", 500, r#"{"name":"second"}"#),
    ];
    let c = select_canonical(&outcomes).unwrap();
    assert_eq!(c.endpoint.as_str(), "wss://z");
  }

  #[test]
  fn no_found_outcomes_means_no_canonical() {
    let outcomes = vec![not_found("wss://a"), failed("wss://b"), unchecked("wss://c")];
    assert!(select_canonical(&outcomes).is_none());
    let report = reconcile(&outcomes, no_trust);
    assert!(report.canonical.is_none());
  }

  // ── Divergence ───────────────────────────────────────────────────────────

  #[test]
  fn both_blank_values_do_not_diverge() {
    let a = fields(r#"{"name":"x","about":""}"#);
    let b = fields(r#"{"name":"x","website":null}"#);
    assert!(divergent_fields(&a, &b).is_empty());
  }

  #[test]
  fn only_compared_fields_count() {
    let a = fields(r#"{"name":"x","custom":"1"}"#);
    let b = fields(r#"{"name":"x","custom":"2"}"#);
    assert!(divergent_fields(&a, &b).is_empty());
  }

  #[test]
  fn divergent_fields_follow_compared_order() {
    let a = fields(r#"{"lud16":"a@b","name":"x","about":"old"}"#);
    let b = fields(r#"{"name":"y","about":"new"}"#);
    assert_eq!(divergent_fields(&a, &b), ["name", "about", "lud16"]);
  }

  // ── Classification ───────────────────────────────────────────────────────

  #[test]
  fn classification_precedence_ignores_input_order() {
    let mut outcomes = vec![
      unchecked("wss://u"),
      failed("wss://f"),
      not_found("wss://n"),
      found("wss://new", 200, r#"{"name":"B"}"#),
      found("wss://old", 100, r#"{"name":"A"}"#),
    ];
    for _ in 0..outcomes.len() {
      outcomes.rotate_left(1);
      let report = reconcile(&outcomes, no_trust);
      let class = |e: &str| {
        report.entry(&Endpoint::new(e)).unwrap().classification
      };
      assert_eq!(class("wss://u"), Classification::Unchecked);
      assert_eq!(class("wss://f"), Classification::Error);
      assert_eq!(class("wss://n"), Classification::NotFound);
      assert_eq!(class("wss://new"), Classification::Latest);
      assert_eq!(class("wss://old"), Classification::Outdated);
    }
  }

  #[test]
  fn non_divergent_but_not_identical_is_ok() {
    let outcomes = vec![
      found("wss://a", 200, r#"{"name":"A","extra":"1"}"#),
      found("wss://b", 100, r#"{"name":"A","extra":"2"}"#),
      found("wss://c", 50, r#"{"extra":"1","name":"A"}"#),
    ];
    let report = reconcile(&outcomes, no_trust);
    let class =
      |e: &str| report.entry(&Endpoint::new(e)).unwrap().classification;
    assert_eq!(class("wss://a"), Classification::Latest);
    assert_eq!(class("wss://b"), Classification::Ok);
    assert_eq!(class("wss://c"), Classification::Ok);
  }

  #[test]
  fn unparsed_documents_classify_ok() {
    let outcomes = vec![
      found("wss://a", 200, "garbage"),
      found("wss://b", 100, r#"{"name":"A"}"#),
    ];
    let report = reconcile(&outcomes, no_trust);
    assert!(report.entries.iter().all(|e| e.classification == Classification::Ok));
    assert!(report.canonical.unwrap().fields.is_none());
  }

  // ── Staleness ────────────────────────────────────────────────────────────

  #[test]
  fn days_behind_floors_and_is_only_defined_when_older() {
    assert_eq!(days_behind(100, 100 + 172_800), Some(2));
    assert_eq!(days_behind(100, 100 + 172_799), Some(1));
    assert_eq!(days_behind(100, 200), Some(0));
    assert_eq!(days_behind(200, 200), None);
    assert_eq!(days_behind(300, 200), None);
  }

  #[test]
  fn days_behind_survives_extreme_timestamps() {
    let full_range = (i128::from(i64::MAX) - i128::from(i64::MIN)) / 86_400;
    assert_eq!(
      days_behind(i64::MIN, i64::MAX),
      Some(i64::try_from(full_range).unwrap())
    );

    let outcomes = vec![
      found("wss://a", -10, r#"{"name":"A"}"#),
      found("wss://b", i64::MAX, r#"{"name":"B"}"#),
    ];
    let report = reconcile(&outcomes, no_trust);
    let a = report.entry(&Endpoint::new("wss://a")).unwrap();
    assert_eq!(a.classification, Classification::Outdated);
    assert_eq!(
      a.days_behind,
      Some(i64::try_from((i128::from(i64::MAX) + 10) / 86_400).unwrap())
    );
  }

  #[test]
  fn scenario_outdated_by_two_days() {
    let outcomes = vec![
      found("wss://r1", 100, r#"{"name":"Alice"}"#),
      found("wss://r2", 100 + 172_800, r#"{"name":"Alicia"}"#),
    ];
    let report = reconcile(&outcomes, no_trust);
    let canonical = report.canonical.as_ref().unwrap();
    assert_eq!(canonical.endpoint.as_str(), "wss://r2");
    assert_eq!(canonical.fields.as_ref().unwrap().get("name"), Some("Alicia"));

    let r1 = report.entry(&Endpoint::new("wss://r1")).unwrap();
    assert_eq!(r1.classification, Classification::Outdated);
    assert_eq!(r1.divergent_fields, ["name"]);
    assert_eq!(r1.days_behind, Some(2));
    assert_eq!(report.tally.outdated, 1);
    assert_eq!(report.tally.latest, 1);

    let outdated: Vec<_> =
      report.outdated().map(|e| e.outcome.endpoint().as_str()).collect();
    assert_eq!(outdated, ["wss://r1"]);
  }

  // ── Report ───────────────────────────────────────────────────────────────

  #[test]
  fn entries_sort_by_endpoint_with_unchecked_last() {
    let outcomes = vec![
      unchecked("wss://a"),
      found("wss://c", 1, "{}"),
      failed("wss://b"),
      unchecked("wss://0"),
      not_found("wss://d"),
    ];
    let report = reconcile(&outcomes, no_trust);
    let order: Vec<_> = report
      .entries
      .iter()
      .map(|e| e.outcome.endpoint().to_string())
      .collect();
    assert_eq!(order, ["wss://b", "wss://c", "wss://d", "wss://0", "wss://a"]);
  }

  #[test]
  fn not_found_is_tallied_apart_from_issues() {
    let outcomes = vec![not_found("wss://a"), failed("wss://b"), not_found("wss://c")];
    let report = reconcile(&outcomes, no_trust);
    assert_eq!(report.tally.issues(), 1);
    assert_eq!(report.tally.no_profile(), 2);
    assert_eq!(report.tally.total(), 3);
  }

  #[test]
  fn trusted_marker_comes_from_predicate() {
    let outcomes = vec![not_found("wss://a"), not_found("wss://b")];
    let report = reconcile(&outcomes, |e| e.as_str() == "wss://b");
    assert!(!report.entry(&Endpoint::new("wss://a")).unwrap().trusted);
    assert!(report.entry(&Endpoint::new("wss://b")).unwrap().trusted);
  }

  // ── Diff ─────────────────────────────────────────────────────────────────

  #[test]
  fn diff_of_canonical_against_itself_is_empty() {
    let c = fields(r#"{"name":"A","about":"hi","picture":"p"}"#);
    let diff = FieldDiff::between(&c, &c);
    assert!(diff.is_empty());
    assert!(diff.outcome_lines().iter().all(|l| !l.highlighted));
  }

  #[test]
  fn diff_lists_pairs_and_highlights_lines() {
    let outcomes = vec![
      found("wss://old", 100, r#"{"name":"Alice","about":"same"}"#),
      found("wss://new", 200, r#"{"name":"Alicia","about":"same","website":"w"}"#),
    ];
    let diff = diff_endpoint(&outcomes, &Endpoint::new("wss://old")).unwrap();
    assert_eq!(diff.changes, [
      FieldChange {
        field:           "name",
        outcome_value:   Some("Alice".into()),
        canonical_value: Some("Alicia".into()),
      },
      FieldChange {
        field:           "website",
        outcome_value:   None,
        canonical_value: Some("w".into()),
      },
    ]);

    let highlighted: Vec<_> = diff
      .canonical_lines()
      .into_iter()
      .filter(|l| l.highlighted)
      .map(|l| l.text.trim().to_string())
      .collect();
    assert_eq!(highlighted, [r#""name": "Alicia","#, r#""website": "w""#]);

    // Same inputs, same output.
    assert_eq!(
      diff,
      diff_endpoint(&outcomes, &Endpoint::new("wss://old")).unwrap()
    );
  }

  #[test]
  fn diff_requires_parsed_fields_on_both_sides() {
    let outcomes = vec![
      found("wss://a", 200, r#"{"name":"A"}"#),
      found("wss://b", 100, "garbage"),
      not_found("wss://c"),
    ];
    assert!(diff_endpoint(&outcomes, &Endpoint::new("wss://b")).is_none());
    assert!(diff_endpoint(&outcomes, &Endpoint::new("wss://c")).is_none());
    assert!(diff_endpoint(&outcomes, &Endpoint::new("wss://missing")).is_none());
  }
}
