//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Attestation payloads are
//! stored as compact JSON (inner data only; the type tag lives in its own
//! column). UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vouch_core::{
  attestation::{Attestation, AttestationValue},
  subject::Subject,
};

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `attestations` row.
pub struct RawAttestation {
  pub attestation_id:   String,
  pub subject_id:       String,
  pub attester_id:      String,
  pub attestation_type: String,
  pub value_json:       String,
  pub comments:         Option<String>,
  pub event_id:         Option<String>,
  pub recorded_at:      String,
}

impl RawAttestation {
  pub fn into_attestation(self) -> Result<Attestation> {
    let data: serde_json::Value = serde_json::from_str(&self.value_json)?;
    let value = AttestationValue::from_parts(&self.attestation_type, data)
      .map_err(Error::Core)?;

    Ok(Attestation {
      attestation_id: decode_uuid(&self.attestation_id)?,
      subject_id:     decode_uuid(&self.subject_id)?,
      attester_id:    decode_uuid(&self.attester_id)?,
      value,
      comments:       self.comments,
      event_id:       self.event_id.as_deref().map(decode_uuid).transpose()?,
      recorded_at:    decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw strings read directly from a `subjects` row, joined with the
/// trust-score cache.
pub struct RawSubject {
  pub subject_id:  String,
  pub username:    String,
  pub created_at:  String,
  pub trust_score: Option<f64>,
}

impl RawSubject {
  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id:  decode_uuid(&self.subject_id)?,
      username:    self.username,
      created_at:  decode_dt(&self.created_at)?,
      trust_score: self.trust_score,
    })
  }
}
