//! Attestation types, the fundamental unit of the vouch store.
//!
//! An attestation is an immutable, typed rating one person submits about
//! another. Attestations are never edited in place; a resubmission with the
//! same supersede key replaces the prior record wholesale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Inclusive rating bounds shared by every rating field.
pub const RATING_MIN: u8 = 1;
pub const RATING_MAX: u8 = 5;

// ─── Payload sub-types ───────────────────────────────────────────────────────

/// A rating of one named skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRating {
  pub skill_name: String,
  /// Integer in `1..=5`.
  pub rating:     u8,
}

/// A three-axis rating of how the subject works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkEthicRating {
  pub reliability:     u8,
  pub teamwork:        u8,
  pub professionalism: u8,
}

impl WorkEthicRating {
  /// The unweighted mean of the three axes, on the `1..=5` scale.
  pub fn mean(&self) -> f64 {
    f64::from(u16::from(self.reliability)
      + u16::from(self.teamwork)
      + u16::from(self.professionalism))
      / 3.0
  }
}

// ─── AttestationValue ────────────────────────────────────────────────────────

/// The typed payload of an attestation. The variant name serves as the
/// `attestation_type` discriminant stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AttestationValue {
  Skill(SkillRating),
  WorkEthic(WorkEthicRating),
}

fn check_rating(field: &'static str, value: u8) -> Result<()> {
  if (RATING_MIN..=RATING_MAX).contains(&value) {
    Ok(())
  } else {
    Err(Error::RatingOutOfRange { field, value })
  }
}

impl AttestationValue {
  /// The discriminant string stored in the `attestation_type` column.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Skill(_) => "skill",
      Self::WorkEthic(_) => "work_ethic",
    }
  }

  /// The skill this payload rates, if it is a skill attestation.
  pub fn skill_name(&self) -> Option<&str> {
    match self {
      Self::Skill(s) => Some(s.skill_name.as_str()),
      Self::WorkEthic(_) => None,
    }
  }

  /// Enforce the per-record payload invariants: every rating field is an
  /// integer in `1..=5`, and a skill rating names a non-blank skill.
  pub fn validate(&self) -> Result<()> {
    match self {
      Self::Skill(s) => {
        if s.skill_name.trim().is_empty() {
          return Err(Error::BlankSkillName);
        }
        check_rating("skill", s.rating)
      }
      Self::WorkEthic(e) => {
        check_rating("reliability", e.reliability)?;
        check_rating("teamwork", e.teamwork)?;
        check_rating("professionalism", e.professionalism)
      }
    }
  }

  /// Serialise the inner payload (without the type tag) for the `value_json`
  /// database column.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    // The full serialised form is `{"type": "...", "data": <payload>}`.
    // We want only the payload.
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Deserialise from the discriminant string and JSON payload stored in the
  /// database.
  pub fn from_parts(
    discriminant: &str,
    data: serde_json::Value,
  ) -> Result<Self> {
    let wrapped = serde_json::json!({ "type": discriminant, "data": data });
    Ok(serde_json::from_value(wrapped)?)
  }
}

// ─── Attestation ─────────────────────────────────────────────────────────────

/// An immutable, stored rating of `subject_id` asserted by `attester_id`.
/// Once written, no field is ever updated; a resubmission with the same
/// supersede key retires this record and stores a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
  pub attestation_id: Uuid,
  pub subject_id:     Uuid,
  pub attester_id:    Uuid,
  pub value:          AttestationValue,
  pub comments:       Option<String>,
  /// Optional reference to the shared work context this rating comes from.
  pub event_id:       Option<Uuid>,
  /// Server-assigned timestamp; never accepted from callers.
  pub recorded_at:    DateTime<Utc>,
}

// ─── NewAttestation ──────────────────────────────────────────────────────────

/// Input to [`crate::store::AttestationStore::append`].
/// `recorded_at` is always set by the store; it is not accepted from callers.
#[derive(Debug, Clone)]
pub struct NewAttestation {
  pub attester_id: Uuid,
  pub subject_id:  Uuid,
  pub value:       AttestationValue,
  pub comments:    Option<String>,
  pub event_id:    Option<Uuid>,
}

impl NewAttestation {
  /// Convenience constructor with the optional fields unset.
  pub fn new(attester_id: Uuid, subject_id: Uuid, value: AttestationValue) -> Self {
    Self {
      attester_id,
      subject_id,
      value,
      comments: None,
      event_id: None,
    }
  }

  pub fn with_comments(mut self, comments: Option<String>) -> Self {
    self.comments = comments;
    self
  }

  pub fn with_event(mut self, event_id: Option<Uuid>) -> Self {
    self.event_id = event_id;
    self
  }

  /// Enforce the submission invariants: no self-attestation, and a
  /// well-formed payload. Validation failures are permanent; they are never
  /// retried.
  pub fn validate(&self) -> Result<()> {
    if self.attester_id == self.subject_id {
      return Err(Error::SelfAttestation);
    }
    self.value.validate()
  }
}
