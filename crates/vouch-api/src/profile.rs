//! Handler for `GET /users/:id/trust-profile`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use serde::Serialize;
use uuid::Uuid;
use vouch_core::{
  attestation::Attestation,
  store::{AttestationStore, ClassifyError},
};

use crate::error::ApiError;

/// A subject's derived reputation: the last computed trust score plus every
/// attestation they have received, newest first.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustProfile {
  /// `null` means unrated, which is distinct from a score of 0.
  pub trust_score:           Option<f64>,
  pub attestations_received: Vec<Attestation>,
}

/// `GET /users/:id/trust-profile` — 404 for an unknown subject.
pub async fn handler<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<TrustProfile>, ApiError>
where
  S: AttestationStore,
  S::Error: ClassifyError,
{
  let subject = store
    .get_subject(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("subject {id} not found")))?;

  let attestations_received =
    store.list_for(id).await.map_err(ApiError::from_store)?;

  Ok(Json(TrustProfile {
    trust_score: subject.trust_score,
    attestations_received,
  }))
}
