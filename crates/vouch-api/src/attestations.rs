//! Handlers for `/attestations` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/attestations/skill` | Body: [`SkillBody`]; returns 201 + stored record |
//! | `POST` | `/attestations/work-ethic` | Body: [`WorkEthicBody`]; returns 201 + stored record |
//!
//! Attester identity is explicit in every body (`attesterId`); the core holds
//! no session state. A resubmission matching an existing supersede key
//! replaces the prior record rather than duplicating it.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use uuid::Uuid;
use vouch_core::{
  attestation::{
    AttestationValue, NewAttestation, SkillRating, WorkEthicRating,
  },
  store::{AttestationStore, ClassifyError},
};

use crate::error::ApiError;

// ─── Skill ────────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /attestations/skill`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillBody {
  pub attester_id:  Uuid,
  pub recipient_id: Uuid,
  pub skill:        String,
  pub rating:       u8,
  pub comments:     Option<String>,
  pub event_id:     Option<Uuid>,
}

/// `POST /attestations/skill` — returns 201 + the stored record.
pub async fn create_skill<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<SkillBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttestationStore,
  S::Error: ClassifyError,
{
  let input = NewAttestation::new(
    body.attester_id,
    body.recipient_id,
    AttestationValue::Skill(SkillRating {
      skill_name: body.skill,
      rating:     body.rating,
    }),
  )
  .with_comments(body.comments)
  .with_event(body.event_id);

  let stored = store.append(input).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(stored)))
}

// ─── Work ethic ───────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /attestations/work-ethic`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkEthicBody {
  pub attester_id:     Uuid,
  pub recipient_id:    Uuid,
  pub reliability:     u8,
  pub teamwork:        u8,
  pub professionalism: u8,
  pub comments:        Option<String>,
  pub event_id:        Option<Uuid>,
}

/// `POST /attestations/work-ethic` — returns 201 + the stored record.
pub async fn create_work_ethic<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<WorkEthicBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttestationStore,
  S::Error: ClassifyError,
{
  let input = NewAttestation::new(
    body.attester_id,
    body.recipient_id,
    AttestationValue::WorkEthic(WorkEthicRating {
      reliability:     body.reliability,
      teamwork:        body.teamwork,
      professionalism: body.professionalism,
    }),
  )
  .with_comments(body.comments)
  .with_event(body.event_id);

  let stored = store.append(input).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(stored)))
}
