//! Subject — the thin envelope that receives attestations.
//!
//! A subject holds only identity metadata plus the derived trust score.
//! Everything else asserted about a person lives in their attestations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person who can submit and receive attestations.
///
/// `trust_score` is derived from received attestations and is never
/// hand-edited; `None` means unrated, which is distinct from a score of 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
  pub subject_id:  Uuid,
  pub username:    String,
  pub created_at:  DateTime<Utc>,
  pub trust_score: Option<f64>,
}
