//! The subject whose profile is being checked, and how user input becomes one.
//!
//! A [`SubjectKey`] is the raw 32-byte public key. Users may type it as 64 hex
//! characters or as a bech32 `npub` / `nprofile` string; [`SubjectKey::decode`]
//! accepts all three and always yields the raw key.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// Length in bytes of a subject key.
pub const SUBJECT_KEY_LEN: usize = 32;

const NPUB_HRP: &str = "npub";
const NPROFILE_HRP: &str = "nprofile";
/// TLV type carrying the public key inside an `nprofile`.
const TLV_SPECIAL: u8 = 0;

/// An opaque, fixed-length subject identifier. Displayed hex-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectKey([u8; SUBJECT_KEY_LEN]);

impl SubjectKey {
  pub fn from_bytes(bytes: [u8; SUBJECT_KEY_LEN]) -> Self { Self(bytes) }

  pub fn as_bytes(&self) -> &[u8; SUBJECT_KEY_LEN] { &self.0 }

  /// Parse exactly 64 hex characters (either case).
  pub fn from_hex(input: &str) -> Result<Self> {
    if input.len() != SUBJECT_KEY_LEN * 2 {
      return Err(Error::InvalidSubjectFormat(format!(
        "expected {} hex characters, got {}",
        SUBJECT_KEY_LEN * 2,
        input.len()
      )));
    }
    let mut bytes = [0u8; SUBJECT_KEY_LEN];
    hex::decode_to_slice(input, &mut bytes)
      .map_err(|e| Error::InvalidSubjectFormat(e.to_string()))?;
    Ok(Self(bytes))
  }

  /// Decode user input: raw hex, `npub…`, or `nprofile…`.
  pub fn decode(input: &str) -> Result<Self> {
    let input = input.trim();
    if input.len() == SUBJECT_KEY_LEN * 2
      && input.bytes().all(|b| b.is_ascii_hexdigit())
    {
      return Self::from_hex(input);
    }

    let (hrp, data) = bech32::decode(input)
      .map_err(|e| Error::InvalidSubjectFormat(e.to_string()))?;

    match hrp.as_str() {
      NPUB_HRP => Self::from_slice(&data),
      NPROFILE_HRP => Self::from_nprofile_tlv(&data),
      other => Err(Error::InvalidSubjectFormat(format!(
        "unsupported identifier prefix {other:?}"
      ))),
    }
  }

  fn from_slice(data: &[u8]) -> Result<Self> {
    let bytes: [u8; SUBJECT_KEY_LEN] = data.try_into().map_err(|_| {
      Error::InvalidSubjectFormat(format!(
        "expected {SUBJECT_KEY_LEN} key bytes, got {}",
        data.len()
      ))
    })?;
    Ok(Self(bytes))
  }

  /// Walk the TLV records of an `nprofile` payload and take the first key.
  /// Relay hints and unknown record types are skipped.
  fn from_nprofile_tlv(mut data: &[u8]) -> Result<Self> {
    while let [kind, len, rest @ ..] = data {
      let len = *len as usize;
      if rest.len() < len {
        break;
      }
      let (value, tail) = rest.split_at(len);
      if *kind == TLV_SPECIAL {
        return Self::from_slice(value);
      }
      data = tail;
    }
    Err(Error::InvalidSubjectFormat(
      "nprofile carries no public key".into(),
    ))
  }
}

impl fmt::Display for SubjectKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&hex::encode(self.0))
  }
}

impl FromStr for SubjectKey {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::decode(s) }
}

impl Serialize for SubjectKey {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.to_string())
  }
}

impl<'de> Deserialize<'de> for SubjectKey {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    Self::from_hex(&s).map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const HEX: &str =
    "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";
  const NPUB: &str =
    "npub180cvv07tjdrrgpa0j7j7tmnyl2yr6yr7l8j4s3evf6u64th6gkwsyjh6w6";
  const NPROFILE: &str = "nprofile1qqsrhuxx8l9ex335q7he0f09aej04zpazpl0ne2cgukyawd24mayt8gpp4mhxue69uhhytnc9e3k7mgpz4mhxue69uhkg6nzv9ejuumpv34kytnrdaksjlyr9p";

  #[test]
  fn hex_round_trips_through_display() {
    let key = SubjectKey::decode(HEX).unwrap();
    assert_eq!(key.to_string(), HEX);
  }

  #[test]
  fn uppercase_hex_is_accepted() {
    let key = SubjectKey::decode(&HEX.to_uppercase()).unwrap();
    assert_eq!(key.to_string(), HEX);
  }

  #[test]
  fn npub_decodes_to_raw_key() {
    let key = SubjectKey::decode(NPUB).unwrap();
    assert_eq!(key.to_string(), HEX);
  }

  #[test]
  fn nprofile_decodes_to_raw_key() {
    let key = SubjectKey::decode(NPROFILE).unwrap();
    assert_eq!(key.to_string(), HEX);
  }

  #[test]
  fn surrounding_whitespace_is_ignored() {
    let key = SubjectKey::decode(&format!("  {NPUB}\n")).unwrap();
    assert_eq!(key.to_string(), HEX);
  }

  #[test]
  fn garbage_is_invalid_subject_format() {
    for input in ["", "hello", "npub1xyz", &HEX[..63], &format!("{HEX}00")] {
      assert!(
        matches!(SubjectKey::decode(input), Err(Error::InvalidSubjectFormat(_))),
        "{input:?} should be rejected"
      );
    }
  }

  #[test]
  fn nprofile_tlv_without_key_is_rejected() {
    let relay_hint = b"wss://r.x";
    let mut tlv = vec![1u8, relay_hint.len() as u8];
    tlv.extend_from_slice(relay_hint);
    assert!(matches!(
      SubjectKey::from_nprofile_tlv(&tlv),
      Err(Error::InvalidSubjectFormat(_))
    ));
  }

  #[test]
  fn nprofile_tlv_skips_leading_relay_hint() {
    let relay_hint = b"wss://r.x";
    let mut tlv = vec![1u8, relay_hint.len() as u8];
    tlv.extend_from_slice(relay_hint);
    tlv.extend_from_slice(&[0u8, 32]);
    tlv.extend_from_slice(&[7u8; 32]);
    let key = SubjectKey::from_nprofile_tlv(&tlv).unwrap();
    assert_eq!(key.as_bytes(), &[7u8; 32]);
  }

  #[test]
  fn serde_uses_hex_string() {
    let key = SubjectKey::from_hex(HEX).unwrap();
    let json = serde_json::to_string(&key).unwrap();
    assert_eq!(json, format!("\"{HEX}\""));
    let back: SubjectKey = serde_json::from_str(&json).unwrap();
    assert_eq!(back, key);
  }
}
